// ============================================================
// Layer 5 — Detector Models
// ============================================================
// Two reference architectures sharing one output contract:
//
//   features [B, T, bins]
//      └── backbone ───────────────► hidden [B, T, H]
//            ├── leitmotif_head ──► sigmoid → [B, T, motifs]
//            ├── mlp_singing ─────► sigmoid → [B, T]
//            └── mlp_version ─────► scores  → [B, T, versions]
//
// The auxiliary heads carry `mlp` in their field names; parameter
// grouping (ml::grouping) relies on that marker to give them their
// own learning rate and to freeze everything else.
//
// RnnDetector: stacked LSTM layers over time.
// CnnDetector: stacked same-padded 1D convolutions over time.

use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Linear, LinearConfig,
        Lstm, LstmConfig,
        PaddingConfig1d,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::ml::grouping::{set_require_grad, ParameterGroups};

// ─── Output contract ─────────────────────────────────────────────────────────
/// The three per-frame predictions of a detector.
#[derive(Debug, Clone)]
pub struct ModelOutputs<B: Backend> {
    /// Leitmotif activation probabilities, [batch, time, motifs]
    pub leitmotif: Tensor<B, 3>,
    /// Singing presence probability, [batch, time]
    pub singing: Tensor<B, 2>,
    /// Version class scores, class dimension last, [batch, time, versions]
    pub version: Tensor<B, 3>,
}

/// What the orchestrator needs from a model.
///
/// `freeze_backbone` / `unfreeze_backbone` toggle gradient tracking for
/// the backbone group only; group membership itself never changes.
pub trait LeitmotifDetector<B: Backend>: Module<B> {
    fn detect(&self, features: Tensor<B, 3>) -> ModelOutputs<B>;

    fn freeze_backbone(self, groups: &ParameterGroups) -> Self {
        set_require_grad(self, &groups.backbone.ids, false)
    }

    fn unfreeze_backbone(self, groups: &ParameterGroups) -> Self {
        set_require_grad(self, &groups.backbone.ids, true)
    }
}

// ─── Auxiliary head ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct AuxiliaryHead<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
}

impl<B: Backend> AuxiliaryHead<B> {
    fn new(d_in: usize, d_hidden: usize, d_out: usize, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(d_in, d_hidden).init(device),
            fc2: LinearConfig::new(d_hidden, d_out).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.fc2.forward(relu(self.fc1.forward(x)))
    }
}

/// The three heads shared by both architectures.
#[derive(Module, Debug)]
pub struct DetectorHeads<B: Backend> {
    pub leitmotif_head: Linear<B>,
    pub mlp_singing:    AuxiliaryHead<B>,
    pub mlp_version:    AuxiliaryHead<B>,
}

impl<B: Backend> DetectorHeads<B> {
    fn new(hidden: usize, mlp_hidden: usize, num_motifs: usize, num_versions: usize, device: &B::Device) -> Self {
        Self {
            leitmotif_head: LinearConfig::new(hidden, num_motifs).init(device),
            mlp_singing:    AuxiliaryHead::new(hidden, mlp_hidden, 1, device),
            mlp_version:    AuxiliaryHead::new(hidden, mlp_hidden, num_versions, device),
        }
    }

    fn forward(&self, hidden: Tensor<B, 3>) -> ModelOutputs<B> {
        let [batch, time, _] = hidden.dims();
        let leitmotif = sigmoid(self.leitmotif_head.forward(hidden.clone()));
        let singing   = sigmoid(self.mlp_singing.forward(hidden.clone())).reshape([batch, time]);
        let version   = self.mlp_version.forward(hidden);
        ModelOutputs { leitmotif, singing, version }
    }
}

// ─── RNN detector ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct RnnDetectorConfig {
    pub n_bins:       usize,
    pub num_motifs:   usize,
    pub num_versions: usize,
    #[config(default = 128)]
    pub hidden_size:  usize,
    #[config(default = 2)]
    pub num_layers:   usize,
    /// Hidden width of the auxiliary MLP heads; `hidden_size / 2` when unset
    pub mlp_hidden_size: Option<usize>,
}

impl RnnDetectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnDetector<B> {
        let layers = (0..self.num_layers.max(1))
            .map(|i| {
                let d_input = if i == 0 { self.n_bins } else { self.hidden_size };
                LstmConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect();
        let mlp_hidden = self.mlp_hidden_size.unwrap_or((self.hidden_size / 2).max(1));
        RnnDetector {
            layers,
            heads: DetectorHeads::new(self.hidden_size, mlp_hidden, self.num_motifs, self.num_versions, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct RnnDetector<B: Backend> {
    pub layers: Vec<Lstm<B>>,
    pub heads:  DetectorHeads<B>,
}

impl<B: Backend> RnnDetector<B> {
    pub fn forward(&self, features: Tensor<B, 3>) -> ModelOutputs<B> {
        let mut x = features;
        for lstm in &self.layers {
            let (output, _state) = lstm.forward(x, None);
            x = output;
        }
        self.heads.forward(x)
    }
}

impl<B: Backend> LeitmotifDetector<B> for RnnDetector<B> {
    fn detect(&self, features: Tensor<B, 3>) -> ModelOutputs<B> {
        self.forward(features)
    }
}

// ─── CNN detector ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct CnnDetectorConfig {
    pub n_bins:       usize,
    pub num_motifs:   usize,
    pub num_versions: usize,
    #[config(default = 128)]
    pub hidden_size:  usize,
    #[config(default = 3)]
    pub num_layers:   usize,
    #[config(default = 5)]
    pub kernel_size:  usize,
    /// Hidden width of the auxiliary MLP heads; `hidden_size / 2` when unset
    pub mlp_hidden_size: Option<usize>,
}

impl CnnDetectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CnnDetector<B> {
        let convs = (0..self.num_layers.max(1))
            .map(|i| {
                let channels_in = if i == 0 { self.n_bins } else { self.hidden_size };
                Conv1dConfig::new(channels_in, self.hidden_size, self.kernel_size)
                    .with_padding(PaddingConfig1d::Same)
                    .init(device)
            })
            .collect();
        let mlp_hidden = self.mlp_hidden_size.unwrap_or((self.hidden_size / 2).max(1));
        CnnDetector {
            convs,
            heads: DetectorHeads::new(self.hidden_size, mlp_hidden, self.num_motifs, self.num_versions, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct CnnDetector<B: Backend> {
    pub convs: Vec<Conv1d<B>>,
    pub heads: DetectorHeads<B>,
}

impl<B: Backend> CnnDetector<B> {
    pub fn forward(&self, features: Tensor<B, 3>) -> ModelOutputs<B> {
        // Conv1d wants [batch, channels, time]
        let mut x = features.swap_dims(1, 2);
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        self.heads.forward(x.swap_dims(1, 2))
    }
}

impl<B: Backend> LeitmotifDetector<B> for CnnDetector<B> {
    fn detect(&self, features: Tensor<B, 3>) -> ModelOutputs<B> {
        self.forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_rnn_output_shapes() {
        let device = Default::default();
        let model: RnnDetector<TestBackend> = RnnDetectorConfig::new(6, 4, 3)
            .with_hidden_size(8)
            .with_num_layers(2)
            .init(&device);

        let out = model.detect(Tensor::zeros([2, 5, 6], &device));
        assert_eq!(out.leitmotif.dims(), [2, 5, 4]);
        assert_eq!(out.singing.dims(), [2, 5]);
        assert_eq!(out.version.dims(), [2, 5, 3]);
    }

    #[test]
    fn test_cnn_output_shapes_and_probability_range() {
        let device = Default::default();
        let model: CnnDetector<TestBackend> = CnnDetectorConfig::new(6, 4, 3)
            .with_hidden_size(8)
            .with_mlp_hidden_size(Some(5))
            .init(&device);

        let out = model.detect(Tensor::ones([3, 7, 6], &device));
        assert_eq!(out.leitmotif.dims(), [3, 7, 4]);
        assert_eq!(out.singing.dims(), [3, 7]);
        assert_eq!(out.version.dims(), [3, 7, 3]);

        let probs = out.leitmotif.to_data().to_vec::<f32>().unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
