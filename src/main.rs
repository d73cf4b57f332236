use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use dual_res::logging::setup_logging;
use dual_res::{DualNetwork, NetworkConfig, TargetDevice, INPUT_LEN};

#[derive(Parser, Debug)]
#[command(name = "dual_res", version, about = "Run the dual residual network on one board")]
struct Cli {
    /// JSON network configuration; flags below override its fields
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of input feature planes
    #[arg(long)]
    in_channels: Option<i64>,

    /// Size of the action space
    #[arg(short = 'n', long)]
    n_classes: Option<i64>,

    /// Encoder width per resolution level (repeatable)
    #[arg(long = "blocks-size")]
    blocks_sizes: Vec<i64>,

    /// Encoder depth per resolution level (repeatable)
    #[arg(long = "depths")]
    depths: Vec<usize>,

    /// Run on the first CUDA device
    #[arg(long, default_value_t = false)]
    cuda: bool,

    /// Run on the device given by `--dev`
    #[arg(long, default_value_t = false, requires = "dev")]
    tpu: bool,

    /// Explicit device: cpu, cuda, cuda:N, mps or vulkan
    #[arg(long)]
    dev: Option<TargetDevice>,

    /// JSON array of 10×11×11 input values; all zeros when omitted
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Number of actions to print
    #[arg(long, default_value_t = 5)]
    top: usize,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write rotating log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn network_config(&self) -> dual_res::Result<NetworkConfig> {
        let mut config = match &self.config {
            Some(path) => NetworkConfig::from_json_file(path)?,
            None => NetworkConfig::default(),
        };

        if let Some(in_channels) = self.in_channels {
            config.in_channels = in_channels;
        }
        if let Some(n_classes) = self.n_classes {
            config.n_classes = n_classes;
        }
        if !self.blocks_sizes.is_empty() {
            config.blocks_sizes = self.blocks_sizes.clone();
        }
        if !self.depths.is_empty() {
            config.depths = self.depths.clone();
        }
        if self.cuda {
            config.cuda = true;
        }
        if self.tpu {
            config.tpu = true;
        }
        if let Some(dev) = self.dev {
            config.dev = Some(dev);
        }
        Ok(config)
    }

    fn board(&self) -> dual_res::Result<Vec<f32>> {
        match &self.input {
            Some(path) => {
                let board: Vec<f32> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
                Ok(board)
            }
            None => Ok(vec![0.0; INPUT_LEN]),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = setup_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let config = cli.network_config()?;
    let board = cli.board()?;

    let mut net = DualNetwork::new(config)?;
    let prediction = net.predict(&board)?;

    println!("🎯 Top actions:");
    for (action, prob) in prediction.top_k(cli.top) {
        println!("   {:>4}  {:.4}", action, prob);
    }
    println!("📈 Value: {:+.4}", prediction.value);

    Ok(())
}
