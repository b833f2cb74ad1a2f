mod cli;

use anyhow::{Context, Result};
use biometric_chaincode::{
    logging, BiometricChaincode, ChaincodeConfig, ChaincodeMetrics, MockStub, Response,
    WorldState,
};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct RenderedResponse<'a> {
    tx_id: &'a str,
    status: i32,
    message: &'a str,
    payload: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ChaincodeConfig::from_file(path)?,
        None => ChaincodeConfig::default(),
    };
    let config = cli.apply_overrides(config);
    logging::init(config.log_format);
    info!(module = %config.module, "starting biometric chaincode peer");

    let metrics = Arc::new(ChaincodeMetrics::new().context("registering chaincode metrics")?);
    let chaincode = BiometricChaincode::new(&config, metrics);

    let mut state = WorldState::load(&cli.state)?;
    let before = state.clone();

    let tx_id = Uuid::new_v4().to_string();
    let ts = cli.tx_timestamp.unwrap_or_else(Utc::now);
    let (function, args) = cli.call();

    let resp = {
        let mut stub = MockStub::new(&mut state, tx_id.as_str(), function, &args).with_timestamp(ts);
        match cli.command {
            Command::Init => stub.init(&chaincode),
            Command::Invoke { .. } => stub.invoke(&chaincode),
        }
    };

    if resp.is_ok() && state != before {
        state
            .save(&cli.state)
            .with_context(|| format!("saving world state to {}", cli.state.display()))?;
        info!(path = %cli.state.display(), records = state.len(), "world state saved");
    }

    println!("{}", serde_json::to_string_pretty(&render(&tx_id, &resp))?);
    if cli.metrics {
        print!("{}", chaincode.metrics().gather_text());
    }

    if !resp.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn render<'a>(tx_id: &'a str, resp: &'a Response) -> RenderedResponse<'a> {
    RenderedResponse {
        tx_id,
        status: resp.status,
        message: &resp.message,
        payload: resp
            .payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned()),
    }
}
