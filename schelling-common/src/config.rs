use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SchellingError};
use crate::sim_params::SimulationConfig;

/// How moves are applied during a sweep.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Row-major scan, each move applied immediately; later cells see earlier moves.
    #[default]
    InPlace,
    /// Every agent is judged against a frozen copy of the grid, then the moves are applied.
    Snapshot,
}

// Engine settings, loaded from the optional [engine] table
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Master seed. Drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Spread the threshold x simulation sweep over the rayon pool.
    #[serde(default)]
    pub parallel: bool,
}

// Output settings, loaded from the optional [output] table
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default = "default_true")]
    pub save_matrix: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_base_filename() -> String {
    "schelling".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_stats: true,
            save_matrix: true,
            format: None,
        }
    }
}

/// Experiment configuration, loaded from a TOML file whose top-level keys
/// keep the historical option names (`nsimulations`, `popwidth`, `raratio`, ...).
/// Unknown keys are rejected.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub nsimulations: usize,
    pub maxniterations: usize,
    pub popwidth: usize,
    pub popheight: usize,
    pub ndepth: usize,
    #[serde(default)]
    pub emptyratio: Option<f64>,
    #[serde(default)]
    pub raratio: Option<f64>,
    #[serde(default)]
    pub rbratio: Option<f64>,
    #[serde(default)]
    pub rcratio: Option<f64>,
    #[serde(default)]
    pub rdratio: Option<f64>,
    #[serde(default)]
    pub reratio: Option<f64>,
    /// Any number of race ratios; takes precedence over the five named keys.
    #[serde(default)]
    pub raceratios: Option<Vec<f64>>,
    /// Regenerate the population distribution before every simulation.
    #[serde(default)]
    pub random: bool,
    /// Race count in random mode; drawn from 2..=5 per simulation when absent.
    #[serde(default)]
    pub numberraces: Option<usize>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ExperimentConfig {
    /// Loads and validates the experiment configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref).map_err(|e| {
            SchellingError::Config(format!("Failed to read config file '{}': {}", path_ref.display(), e))
        })?;
        Self::from_toml_str(&config_str).map_err(|e| match e {
            SchellingError::Config(msg) => {
                SchellingError::Config(format!("{} (in '{}')", msg, path_ref.display()))
            }
            other => other,
        })
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: ExperimentConfig = toml::from_str(config_str)
            .map_err(|e| SchellingError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nsimulations == 0 {
            return Err(SchellingError::Config("nsimulations must be greater than 0".into()));
        }
        if self.random {
            if self.numberraces == Some(0) {
                return Err(SchellingError::Config("numberraces must be greater than 0".into()));
            }
            // Geometry is still checked; the ratios are regenerated per simulation.
            return self.simulation_with_ratios(1.0, 0.0, vec![1.0]).validate();
        }
        self.base_simulation(1.0)?.validate()
    }

    /// The ordered race ratios, either from `raceratios` or from the named keys.
    pub fn race_ratios(&self) -> Result<Vec<f64>> {
        if let Some(ratios) = &self.raceratios {
            return Ok(ratios.clone());
        }

        let named = [
            ("raratio", self.raratio),
            ("rbratio", self.rbratio),
            ("rcratio", self.rcratio),
            ("rdratio", self.rdratio),
            ("reratio", self.reratio),
        ];
        let present = named.iter().take_while(|(_, value)| value.is_some()).count();
        if let Some((key, _)) = named[present..].iter().find(|(_, value)| value.is_some()) {
            return Err(SchellingError::Config(format!(
                "'{}' is set but '{}' is missing; race ratios must be given in order",
                key, named[present].0
            )));
        }
        Ok(named[..present].iter().filter_map(|(_, value)| *value).collect())
    }

    /// Simulation parameters with an explicit population distribution.
    pub fn simulation_with_ratios(
        &self,
        similarity_threshold: f64,
        empty_ratio: f64,
        race_ratios: Vec<f64>,
    ) -> SimulationConfig {
        SimulationConfig {
            width: self.popwidth,
            height: self.popheight,
            neighbour_depth: self.ndepth,
            similarity_threshold,
            empty_ratio,
            race_ratios,
        }
    }

    /// Simulation parameters of the fixed-ratio sweep at one threshold.
    pub fn base_simulation(&self, similarity_threshold: f64) -> Result<SimulationConfig> {
        let empty_ratio = self
            .emptyratio
            .ok_or_else(|| SchellingError::Config("missing key 'emptyratio'".into()))?;
        Ok(self.simulation_with_ratios(similarity_threshold, empty_ratio, self.race_ratios()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED: &str = r#"
nsimulations = 4
maxniterations = 50
popwidth = 20
popheight = 10
ndepth = 1
emptyratio = 0.0
raratio = 0.5
rbratio = 0.125
rcratio = 0.125
rdratio = 0.125
reratio = 0.125
"#;

    #[test]
    fn test_fixed_config_parses_with_defaults() {
        let config = ExperimentConfig::from_toml_str(FIXED).unwrap();
        assert_eq!(config.nsimulations, 4);
        assert!(!config.random);
        assert_eq!(config.engine.update_mode, UpdateMode::InPlace);
        assert!(config.engine.seed.is_none());
        assert_eq!(config.output.base_filename, "schelling");
        assert!(config.output.save_stats);

        let sim = config.base_simulation(0.42).unwrap();
        assert_eq!((sim.width, sim.height, sim.neighbour_depth), (20, 10, 1));
        assert_eq!(sim.race_ratios, vec![0.5, 0.125, 0.125, 0.125, 0.125]);
        assert_eq!(sim.similarity_threshold, 0.42);
    }

    #[test]
    fn test_ratio_sum_off_by_a_percent_is_rejected() {
        let doc = FIXED.replace("raratio = 0.5", "raratio = 0.49");
        let err = ExperimentConfig::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, SchellingError::Validation(_)));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let doc = FIXED.replace("popwidth = 20", "");
        let err = ExperimentConfig::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, SchellingError::Config(_)));

        let doc = FIXED.replace("emptyratio = 0.0", "");
        let err = ExperimentConfig::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, SchellingError::Config(_)));
    }

    #[test]
    fn test_gap_in_named_ratios_is_config_error() {
        let doc = FIXED.replace("rbratio = 0.125", "");
        let err = ExperimentConfig::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, SchellingError::Config(_)));
    }

    #[test]
    fn test_ratio_array_and_tables() {
        let doc = r#"
nsimulations = 2
maxniterations = 10
popwidth = 5
popheight = 5
ndepth = 2
emptyratio = 0.1
raceratios = [0.3, 0.3, 0.1, 0.1, 0.05, 0.05]

[engine]
seed = 7
update_mode = "snapshot"
parallel = true

[output]
base_filename = "run"
format = "bincode"
save_matrix = false
"#;
        let config = ExperimentConfig::from_toml_str(doc).unwrap();
        assert_eq!(config.race_ratios().unwrap().len(), 6);
        assert_eq!(config.engine.seed, Some(7));
        assert_eq!(config.engine.update_mode, UpdateMode::Snapshot);
        assert!(config.engine.parallel);
        assert_eq!(config.output.format.as_deref(), Some("bincode"));
        assert!(!config.output.save_matrix);
        assert!(config.output.save_stats);
    }

    #[test]
    fn test_random_mode_ignores_ratios() {
        let doc = r#"
nsimulations = 3
maxniterations = 10
popwidth = 8
popheight = 8
ndepth = 1
random = true
numberraces = 3
"#;
        let config = ExperimentConfig::from_toml_str(doc).unwrap();
        assert!(config.random);
        assert_eq!(config.numberraces, Some(3));

        let zero_races = doc.replace("numberraces = 3", "numberraces = 0");
        assert!(ExperimentConfig::from_toml_str(&zero_races).is_err());
    }

    #[test]
    fn test_unknown_keys_are_config_errors() {
        let doc = format!("{}Random = true\n", FIXED);
        let err = ExperimentConfig::from_toml_str(&doc).unwrap_err();
        match err {
            SchellingError::Config(msg) => assert!(msg.contains("Random"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }

        let doc = format!("{}\n[engine]\nsed = 3\n", FIXED);
        assert!(matches!(
            ExperimentConfig::from_toml_str(&doc),
            Err(SchellingError::Config(_))
        ));

        let doc = format!("{}\n[output]\nfromat = \"bincode\"\n", FIXED);
        assert!(matches!(
            ExperimentConfig::from_toml_str(&doc),
            Err(SchellingError::Config(_))
        ));
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let doc = FIXED.replace("nsimulations = 4", "nsimulations = 0");
        assert!(matches!(
            ExperimentConfig::from_toml_str(&doc),
            Err(SchellingError::Config(_))
        ));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = ExperimentConfig::load("/nonexistent/schelling.toml").unwrap_err();
        match err {
            SchellingError::Config(msg) => assert!(msg.contains("schelling.toml")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
