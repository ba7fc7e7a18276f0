use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use walletlens_core::clustering::{DbscanParams, EmbeddingParams, KMeansParams, SweepRange};
use walletlens_core::{ClusteringConfig, FeatureSelection, PipelineConfig};

use crate::cli::{Algorithm, ClusterArgs, RangeArgs};
use crate::error::{CliError, CliResult};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub features: FeaturesConfig,
    pub clustering: ClusteringDefaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// Tokens valued at exactly 1 USD
    pub stable_tokens: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    /// Columns to cluster on; empty means all
    #[serde(default)]
    pub columns: Vec<String>,
    pub standardize: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringDefaults {
    pub algorithm: Algorithm,
    pub k: usize,
    pub eps: f64,
    pub min_points: usize,
    pub components: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl AppConfig {
    pub fn load(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Pricing defaults
            .set_default(
                "pricing.stable_tokens",
                vec!["USDC", "USDT", "DAI", "BUSD", "TUSD", "USDP", "FRAX", "LUSD"],
            )?
            // Feature defaults
            .set_default("features.columns", Vec::<String>::new())?
            .set_default("features.standardize", true)?
            // Clustering defaults
            .set_default("clustering.algorithm", "kmeans")?
            .set_default("clustering.k", 4)?
            .set_default("clustering.eps", 0.5)?
            .set_default("clustering.min_points", 5)?
            .set_default("clustering.components", 2)?
            .set_default("clustering.seed", 42)?
            .set_default("clustering.n_init", 10)?
            .set_default("clustering.max_iterations", 300)?
            .set_default("clustering.tolerance", 1e-4)?
            // Load from config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (WALLETLENS__CLUSTERING__K, etc.)
        let config = builder
            .add_source(
                Environment::with_prefix("WALLETLENS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pricing.stable_tokens")
                    .with_list_parse_key("features.columns"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Merge command-line overrides into a pipeline configuration
    pub fn pipeline_config(&self, args: &ClusterArgs) -> CliResult<PipelineConfig> {
        let columns = if args.columns.is_empty() {
            &self.features.columns
        } else {
            &args.columns
        };

        Ok(PipelineConfig {
            stable_tokens: self.pricing.stable_tokens.clone(),
            features: FeatureSelection::from_names(columns.as_slice())?,
            standardize: self.features.standardize && !args.no_standardize,
            clustering: self.clustering_config(args),
            sweep: None,
        })
    }

    fn clustering_config(&self, args: &ClusterArgs) -> ClusteringConfig {
        let defaults = &self.clustering;
        let k = args.k.unwrap_or(defaults.k);
        let seed = args.seed.unwrap_or(defaults.seed);

        match args.algorithm.unwrap_or(defaults.algorithm) {
            Algorithm::Kmeans => ClusteringConfig::Kmeans(KMeansParams {
                k,
                max_iterations: defaults.max_iterations,
                tolerance: defaults.tolerance,
                n_init: defaults.n_init,
                seed,
            }),
            Algorithm::Dbscan => ClusteringConfig::Dbscan(DbscanParams {
                eps: args.eps.unwrap_or(defaults.eps),
                min_points: args.min_points.unwrap_or(defaults.min_points),
            }),
            Algorithm::Embedding => ClusteringConfig::Embedding(EmbeddingParams {
                components: args.components.unwrap_or(defaults.components),
                k,
                max_iterations: defaults.max_iterations,
                tolerance: defaults.tolerance,
                n_init: defaults.n_init,
                seed,
            }),
        }
    }
}

/// Pick the sweep range matching the configured algorithm
pub fn sweep_range(config: &ClusteringConfig, range: &RangeArgs) -> CliResult<SweepRange> {
    match config {
        ClusteringConfig::Kmeans(_) | ClusteringConfig::Embedding(_) => {
            if range.k_min > range.k_max {
                return Err(CliError::InvalidArgument(format!(
                    "--k-min ({}) must not exceed --k-max ({})",
                    range.k_min, range.k_max
                )));
            }
            Ok(SweepRange::K {
                min: range.k_min,
                max: range.k_max,
            })
        }
        ClusteringConfig::Dbscan(_) => Ok(SweepRange::Eps {
            min: range.eps_min,
            max: range.eps_max,
            step: range.eps_step,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_and_file_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[clustering]\nalgorithm = \"dbscan\"\neps = 0.8\n\n\
             [pricing]\nstable_tokens = [\"USDC\", \"MIM\"]"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.clustering.algorithm, Algorithm::Dbscan);
        assert_eq!(config.clustering.k, 4);
        assert_eq!(config.pricing.stable_tokens, vec!["USDC", "MIM"]);
        assert!(config.features.standardize);

        let pipeline = config.pipeline_config(&ClusterArgs::default()).unwrap();
        assert_eq!(pipeline.clustering, ClusteringConfig::Dbscan(DbscanParams::new(0.8, 5)));
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = AppConfig::load(None).unwrap();
        let args = ClusterArgs {
            algorithm: Some(Algorithm::Kmeans),
            k: Some(7),
            no_standardize: true,
            columns: vec!["swap_count".to_string()],
            ..ClusterArgs::default()
        };

        let pipeline = config.pipeline_config(&args).unwrap();
        assert!(!pipeline.standardize);
        assert_eq!(pipeline.features.columns().len(), 1);
        match pipeline.clustering {
            ClusteringConfig::Kmeans(params) => assert_eq!(params.k, 7),
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let config = AppConfig::load(None).unwrap();
        let args = ClusterArgs {
            columns: vec!["whale_score".to_string()],
            ..ClusterArgs::default()
        };
        assert!(config.pipeline_config(&args).is_err());
    }
}
