mod report;
mod runner;
mod synthetic;

pub use runner::{build_model, check_equivariance, score};
pub use synthetic::synthesize_descriptors;

use self::report::{report_equivariance, report_loss, report_prediction};
use crate::config::{Args, Config};
use crate::io::{load_tensor_map, save_tensor_map, setup_output};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use rholearn::tensor::{SphericalKey, TensorMap};
use std::fs;
use tracing::info;

pub struct RholearnApplication {
    args: Args,
    config: Config,
}

impl RholearnApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());
        info!("Configuration loaded:\n{:?}", self.config);

        let input = self.load_input()?;
        let model = build_model(&self.args, &self.config, &input)?;

        let prediction = model.forward(&input).wrap_err("Forward pass failed")?;
        report_prediction(&prediction);

        let (angles, report) = check_equivariance(&model, &input, &self.args, &self.config)?;
        report_equivariance(&angles, &report);

        if let Some(summary) = score(&prediction, &self.args, &self.config)? {
            report_loss(&summary);
        }

        if let Some(path) = &self.args.predictions {
            save_tensor_map(path, &prediction)?;
        }
        if let Some(path) = &self.args.save_model {
            model
                .save(path)
                .wrap_err_with(|| format!("Unable to save model: {}", path))?;
        }

        Ok(())
    }

    fn load_input(&self) -> Result<TensorMap<SphericalKey>> {
        match &self.args.input {
            Some(path) => load_tensor_map(path),
            None => synthesize_descriptors(&self.config, self.config.seed(&self.args)),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
