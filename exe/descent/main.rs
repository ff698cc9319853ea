mod app_config;

use app_config::AppConfig;
use clap::{Parser, Subcommand, ValueEnum};
use descent::{
  grad::EngineKind,
  subcommands::{self, DataSource},
  utils,
};
use std::{
  error::Error,
  path::{Path, PathBuf},
};
use tracing::info;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
  /// YAML file overriding the compiled-in training defaults
  #[arg(short, long, value_name = "PATH", global = true)]
  config: Option<PathBuf>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
  Autodiff,
  FiniteDifference,
}

impl From<EngineArg> for EngineKind {
  fn from(arg: EngineArg) -> Self {
    match arg {
      EngineArg::Autodiff => EngineKind::Autodiff,
      EngineArg::FiniteDifference => EngineKind::FiniteDifference,
    }
  }
}

#[derive(Subcommand)]
enum Command {
  /// Train the genre classifier
  Train {
    /// JSON file with `train` and `test` tensors
    #[arg(
      short,
      long,
      value_name = "PATH",
      required_unless_present = "synthetic",
      conflicts_with = "synthetic"
    )]
    data: Option<PathBuf>,
    /// Train on generated zeros-vs-ones data instead of a file
    #[arg(long)]
    synthetic: bool,
    #[arg(short, long, value_enum, default_value_t = EngineArg::Autodiff)]
    engine: EngineArg,
    /// Where to write the trained weights as JSON
    #[arg(short, long, value_name = "PATH")]
    weights_out: Option<PathBuf>,
    /// Start from weights written by an earlier run
    #[arg(long, value_name = "PATH")]
    weights_in: Option<PathBuf>,
    #[arg(short, long, value_name = "INT")]
    updates: Option<usize>,
  },
  /// Two-weight linear model walkthrough
  Toy {
    #[arg(short, long, value_enum, default_value_t = EngineArg::Autodiff)]
    engine: EngineArg,
  },
}

fn main() -> Result<(), Box<dyn Error>> {
  utils::init_logging()?;
  let args = Cli::parse();

  let file_config = match &args.config {
    Some(path) => {
      info!("Reading config from {:?}", path);
      AppConfig::from_file(path)?
    }
    None => AppConfig::default(),
  };

  match args.command {
    Command::Train {
      data,
      synthetic: _,
      engine,
      weights_out,
      weights_in,
      updates,
    } => {
      let cli_config = AppConfig {
        num_updates: updates,
        ..AppConfig::default()
      };
      let config = file_config.merge(cli_config);
      let source = match data {
        Some(path) => DataSource::File(path),
        None => DataSource::Synthetic,
      };
      let mut app = subcommands::Train::new(source, config.train_config(), engine.into());
      if let Some(path) = &weights_in {
        app = app.weights_input(path);
      }
      if let Some(path) = &weights_out {
        app = app.weights_output(path);
      }
      if let Some(dir) = &config.artifacts {
        app = app.artifacts(Path::new(dir));
      }
      app.run()?;
    }
    Command::Toy { engine } => {
      subcommands::Toy::new(engine.into()).run()?;
    }
  }
  Ok(())
}
