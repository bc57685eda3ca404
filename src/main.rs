use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    portal_session::run().await
}
