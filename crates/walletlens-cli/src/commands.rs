//! Subcommand handlers

use walletlens_core::{Pipeline, WalletFeatureVector};

use crate::cli::{ClusterArgs, IoArgs, RangeArgs};
use crate::config::{sweep_range, AppConfig};
use crate::error::CliResult;
use crate::input::{read_transactions, write_json};

pub fn run_features(config: &AppConfig, io: &IoArgs) -> CliResult<()> {
    let pipeline = Pipeline::new(config.pipeline_config(&ClusterArgs::default())?);
    let transactions = read_transactions(&io.input)?;

    let features: Vec<WalletFeatureVector> = pipeline.features(&transactions)?;
    let unpriced: u64 = features.iter().map(|f| f.unpriced_tx_count).sum();
    if unpriced > 0 {
        tracing::warn!(unpriced, "Transactions excluded from profitability for lack of a price");
    }
    tracing::info!(wallets = features.len(), "Aggregated wallet features");

    write_json(&features, io.output.as_deref())
}

pub fn run_cluster(config: &AppConfig, io: &IoArgs, params: &ClusterArgs) -> CliResult<()> {
    let pipeline = Pipeline::new(config.pipeline_config(params)?);
    let transactions = read_transactions(&io.input)?;

    let report = pipeline.run(&transactions)?;
    write_json(&report, io.output.as_deref())
}

pub fn run_sweep(
    config: &AppConfig,
    io: &IoArgs,
    params: &ClusterArgs,
    range: &RangeArgs,
) -> CliResult<()> {
    let mut pipeline_config = config.pipeline_config(params)?;
    pipeline_config.sweep = Some(sweep_range(&pipeline_config.clustering, range)?);

    let pipeline = Pipeline::new(pipeline_config);
    let transactions = read_transactions(&io.input)?;

    let report = pipeline.run(&transactions)?;
    write_json(&report, io.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use walletlens_core::PipelineReport;

    fn write_input() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for (i, wallet) in ["0xa", "0xa", "0xb", "0xc", "0xc", "0xd"].iter().enumerate() {
            let (weth, usdc) = if i % 2 == 0 { ("1", "-1000") } else { ("-1", "1010") };
            writeln!(
                file,
                r#"{{"tx_hash":"0x{i}","wallet":"{wallet}","kind":"swap","pair":{{"token0":"WETH","token1":"USDC"}},"token0_delta":"{weth}","token1_delta":"{usdc}","amount_usd":"1000","timestamp":"2022-05-0{day}T00:00:00Z","gas_fee":"2"}}"#,
                day = i + 1,
            )
            .unwrap();
        }
        file
    }

    #[test]
    fn test_cluster_writes_report() {
        let input = write_input();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.json");

        let config = AppConfig::load(None).unwrap();
        let io = IoArgs {
            input: input.path().to_path_buf(),
            output: Some(output.clone()),
        };
        let params = ClusterArgs {
            k: Some(2),
            ..ClusterArgs::default()
        };
        run_cluster(&config, &io, &params).unwrap();

        let report: PipelineReport =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report.features.len(), 4);
        assert_eq!(report.clustering.unwrap().assignments.len(), 4);
    }

    #[test]
    fn test_sweep_writes_points() {
        let input = write_input();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sweep.json");

        let config = AppConfig::load(None).unwrap();
        let io = IoArgs {
            input: input.path().to_path_buf(),
            output: Some(output.clone()),
        };
        let range = RangeArgs {
            k_min: 1,
            k_max: 3,
            eps_min: 0.1,
            eps_max: 1.0,
            eps_step: 0.1,
        };
        run_sweep(&config, &io, &ClusterArgs::default(), &range).unwrap();

        let report: PipelineReport =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(report.clustering.is_none());
        assert_eq!(report.sweep.unwrap().len(), 3);
    }
}
