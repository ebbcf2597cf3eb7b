//! Lambda entrypoint.
//!
//! Telemetry is initialised before the runtime starts accepting invocations
//! so the cold-start span is exported. On a clean exit the guard is shut
//! down explicitly; a shutdown failure is reported as an abnormal exit.

use lambda_runtime::{Error, Runtime};

use hello_greeter::{greeting_service, init_telemetry};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let guard = init_telemetry()?;

    let result = Runtime::new(greeting_service(&guard)).run().await;

    guard.shutdown()?;
    result
}
