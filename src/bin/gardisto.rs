use anyhow::Result;
use gardisto::cli::{actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    match action {
        Action::Server(args) => gardisto::cli::actions::server::execute(args).await,
    }
}
