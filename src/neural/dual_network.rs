//! Dual network
//!
//! Shared residual encoder with a policy head and a value head. Owns the
//! parameter store, the device placement and the train/eval mode flag.

use tch::kind::Element;
use tch::{nn, Device, Kind, Tensor};

use crate::config::NetworkConfig;
use crate::neural::encoder::Encoder;
use crate::neural::policy_value_net::{PolicyHead, ValueHead};
use crate::neural::res_net_block::BlockConfig;
use crate::neural::{BOARD_SIDE, INPUT_LEN, INPUT_PLANES};
use crate::{DualResError, Result};

/// Whether normalization layers use batch statistics (train) or running ones (eval)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Host-side output of [`DualNetwork::predict`]
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Probability of each action, sums to 1
    pub policy: Vec<f32>,
    /// Position evaluation in (-1, 1)
    pub value: f32,
}

impl Prediction {
    /// Action indices sorted by decreasing probability, at most `k` of them
    pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self.policy.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }

    pub fn best_action(&self) -> Option<usize> {
        self.top_k(1).first().map(|&(action, _)| action)
    }
}

/// Anything a search loop can ask for a (policy, value) estimate
///
/// Implementors hold libtorch tensors and are not Sync; share them behind a Mutex.
pub trait PositionEvaluator {
    fn evaluate(&mut self, planes: &[f32]) -> Result<Prediction>;
}

pub struct DualNetwork {
    config: NetworkConfig,
    device: Device,
    vs: nn::VarStore,
    encoder: Encoder,
    policy: PolicyHead,
    value: ValueHead,
    mode: Mode,
}

impl DualNetwork {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device()?;

        log::info!("🧠 Building dual network on {:?}...", device);
        log::debug!(
            "Network config: in_channels={}, n_classes={}, blocks_sizes={:?}, depths={:?}, expansion={}",
            config.in_channels,
            config.n_classes,
            config.blocks_sizes,
            config.depths,
            config.expansion
        );

        let vs = nn::VarStore::new(device);
        let block = BlockConfig {
            expansion: config.expansion,
            downsampling: 1,
            activation: config.activation,
        };

        let (encoder, policy, value) = {
            let root = vs.root();
            let encoder = Encoder::new(
                &(&root / "encoder"),
                config.in_channels,
                &config.blocks_sizes,
                &config.depths,
                block,
            )?;
            let features = encoder.out_channels();
            let policy = PolicyHead::new(&(&root / "policy"), features, config.n_classes);
            let value = ValueHead::new(&(&root / "value"), features);
            (encoder, policy, value)
        };

        let net = Self {
            config,
            device,
            vs,
            encoder,
            policy,
            value,
            mode: Mode::Train,
        };
        log::info!("✅ Dual network ready\n{}", net.summary());
        Ok(net)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn policy_head(&self) -> &PolicyHead {
        &self.policy
    }

    pub fn value_head(&self) -> &ValueHead {
        &self.value
    }

    /// Parameters, for an external trainer or checkpointing
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_training(&self) -> bool {
        self.mode == Mode::Train
    }

    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
    }

    /// Run encoder and both heads in the current mode
    pub fn forward(&self, x: &Tensor) -> (Tensor, Tensor) {
        self.forward_t(x, self.is_training())
    }

    pub fn forward_t(&self, x: &Tensor, train: bool) -> (Tensor, Tensor) {
        let features = x.apply_t(&self.encoder, train);
        let pi = features.apply_t(&self.policy, train);
        let v = features.apply_t(&self.value, train);
        (pi, v)
    }

    /// Evaluate one raw `10 × 11 × 11` board.
    ///
    /// Leaves the network in eval mode. Gradient tracking is suspended only
    /// while the forward pass runs.
    pub fn predict<T: Element>(&mut self, x: &[T]) -> Result<Prediction> {
        if x.len() != INPUT_LEN {
            return Err(DualResError::InputShape {
                expected: INPUT_LEN,
                actual: x.len(),
            });
        }

        let input = Tensor::f_from_slice(x)?
            .f_to_kind(Kind::Float)?
            .to_device(self.device)
            .f_view([1, INPUT_PLANES, BOARD_SIDE, BOARD_SIDE])?;

        self.eval();
        let (pi, v) = {
            let _guard = tch::no_grad_guard();
            self.forward(&input)
        };

        let policy = Vec::<f32>::try_from(&pi.to_device(Device::Cpu).f_squeeze_dim(0)?)?;
        let value = v.to_device(Device::Cpu).f_double_value(&[0, 0])? as f32;

        log::debug!("predict: value={:.4}, actions={}", value, policy.len());
        Ok(Prediction { policy, value })
    }

    /// Get summary information about the network
    pub fn summary(&self) -> NetworkSummary {
        let variables = self.vs.variables();
        NetworkSummary {
            in_channels: self.config.in_channels,
            n_classes: self.config.n_classes,
            blocks_sizes: self.config.blocks_sizes.clone(),
            depths: self.config.depths.clone(),
            feature_channels: self.encoder.out_channels(),
            device: format!("{:?}", self.device),
            tensors: variables.len(),
            parameters: variables.values().map(Tensor::numel).sum(),
        }
    }
}

impl PositionEvaluator for DualNetwork {
    fn evaluate(&mut self, planes: &[f32]) -> Result<Prediction> {
        self.predict(planes)
    }
}

/// Summary information about a dual network
#[derive(Debug, Clone)]
pub struct NetworkSummary {
    pub in_channels: i64,
    pub n_classes: i64,
    pub blocks_sizes: Vec<i64>,
    pub depths: Vec<usize>,
    pub feature_channels: i64,
    pub device: String,
    pub tensors: usize,
    pub parameters: usize,
}

impl std::fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dual Network Summary:\n\
             📐 Input Planes: {}\n\
             🎯 Actions: {}\n\
             🧱 Widths: {:?}, Depths: {:?} → {} feature channels\n\
             💻 Device: {}\n\
             🔢 Tensors: {}, Parameters: {}",
            self.in_channels,
            self.n_classes,
            self.blocks_sizes,
            self.depths,
            self.feature_channels,
            self.device,
            self.tensors,
            self.parameters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::config::TargetDevice;
    use std::panic::{self, AssertUnwindSafe};
    use tch::kind;

    fn small_config() -> NetworkConfig {
        NetworkConfig {
            n_classes: 5,
            blocks_sizes: vec![16],
            depths: vec![2],
            ..Default::default()
        }
    }

    fn grad_enabled() -> bool {
        let x = Tensor::ones([1], kind::FLOAT_CPU).set_requires_grad(true);
        (&x * 2.0).requires_grad()
    }

    #[test]
    fn test_forward_shapes() {
        let net = DualNetwork::new(small_config()).unwrap();
        let input = Tensor::randn([3, 10, 11, 11], kind::FLOAT_CPU);

        let (pi, v) = net.forward(&input);
        assert_eq!(pi.size(), vec![3, 5]);
        assert_eq!(v.size(), vec![3, 1]);
    }

    #[test]
    fn test_new_starts_in_training_mode() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        assert_eq!(net.mode(), Mode::Train);

        net.eval();
        assert!(!net.is_training());
        net.train();
        assert!(net.is_training());
    }

    #[test]
    fn test_predict_on_zeros() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        let board = vec![0.0f32; INPUT_LEN];

        let prediction = net.predict(&board).unwrap();
        assert_eq!(prediction.policy.len(), 5);
        let total: f32 = prediction.policy.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(prediction.value > -1.0 && prediction.value < 1.0);
        assert_eq!(net.mode(), Mode::Eval);
    }

    #[test]
    fn test_predict_accepts_double_input() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        let board: Vec<f64> = (0..INPUT_LEN).map(|i| (i % 3) as f64).collect();

        let prediction = net.predict(&board).unwrap();
        assert_eq!(prediction.policy.len(), 5);
    }

    #[test]
    fn test_predict_is_repeatable() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        let board: Vec<f32> = (0..INPUT_LEN).map(|i| ((i * 7) % 5) as f32 / 4.0).collect();

        let first = net.predict(&board).unwrap();
        let second = net.predict(&board).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_rejects_wrong_length() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        let result = net.predict(&[0.0f32; 100]);

        assert_matches!(
            result,
            Err(DualResError::InputShape { expected: 1210, actual: 100 })
        );
        assert!(grad_enabled());
    }

    #[test]
    fn test_predict_restores_grad_mode() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        net.predict(&vec![1.0f32; INPUT_LEN]).unwrap();
        assert!(grad_enabled());
    }

    #[test]
    fn test_predict_restores_grad_mode_after_panic() {
        // 3 input planes cannot consume the fixed 10-plane board
        let config = NetworkConfig {
            in_channels: 3,
            ..small_config()
        };
        let mut net = DualNetwork::new(config).unwrap();
        let board = vec![0.0f32; INPUT_LEN];

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| net.predict(&board)));
        assert!(outcome.is_err());
        assert!(grad_enabled());
    }

    #[test]
    fn test_predict_on_explicit_device() {
        let config = NetworkConfig {
            tpu: true,
            dev: Some(TargetDevice::Cpu),
            ..small_config()
        };
        let mut net = DualNetwork::new(config).unwrap();
        assert_eq!(net.device(), Device::Cpu);

        let prediction = net.predict(&vec![0.25f32; INPUT_LEN]).unwrap();
        assert_eq!(prediction.policy.len(), 5);
        let total: f32 = prediction.policy.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(prediction.value > -1.0 && prediction.value < 1.0);
    }

    #[test]
    fn test_unavailable_device_is_rejected() {
        let config = NetworkConfig {
            tpu: true,
            dev: Some(TargetDevice::Cuda(usize::MAX)),
            ..small_config()
        };
        assert_matches!(
            DualNetwork::new(config),
            Err(DualResError::DeviceUnavailable(_))
        );
    }

    #[test]
    fn test_missing_device_is_rejected() {
        let config = NetworkConfig {
            tpu: true,
            ..small_config()
        };
        assert_matches!(DualNetwork::new(config), Err(DualResError::MissingDevice));
    }

    #[test]
    fn test_evaluator_trait() {
        let mut net = DualNetwork::new(small_config()).unwrap();
        let evaluator: &mut dyn PositionEvaluator = &mut net;

        let prediction = evaluator.evaluate(&[0.5; INPUT_LEN]).unwrap();
        assert_eq!(prediction.policy.len(), 5);
        assert!(prediction.best_action().is_some());
    }

    #[test]
    fn test_prediction_top_k() {
        let prediction = Prediction {
            policy: vec![0.1, 0.5, 0.15, 0.25],
            value: 0.0,
        };
        assert_eq!(prediction.top_k(2), vec![(1, 0.5), (3, 0.25)]);
        assert_eq!(prediction.best_action(), Some(1));
        assert_eq!(prediction.top_k(10).len(), 4);
    }

    #[test]
    fn test_summary_display() {
        let net = DualNetwork::new(small_config()).unwrap();
        let summary = net.summary();

        assert_eq!(summary.feature_channels, 16);
        assert!(summary.parameters > 0);
        assert_eq!(summary.tensors, net.var_store().variables().len());

        let display = format!("{}", summary);
        assert!(display.contains("Dual Network Summary"));
        assert!(display.contains("Actions: 5"));
        assert!(display.contains("Device: Cpu"));
    }
}
