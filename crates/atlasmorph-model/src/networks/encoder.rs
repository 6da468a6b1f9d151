use burn::{
    nn::{Linear, LinearConfig, Relu},
    prelude::*,
};

/// Maps a batch of observations to one real vector per observation.
pub trait LatentEncoder<B: Backend> {
    /// `[B, C, D, H, W]` -> `[B, out_dim]`
    fn encode(&self, observations: Tensor<B, 5>) -> Tensor<B, 2>;

    fn out_dim(&self) -> usize;
}

/// Two-layer perceptron over flattened observations.
#[derive(Module, Debug)]
pub struct MlpEncoder<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
    in_features: usize,
    out_dim: usize,
}

#[derive(Config, Debug)]
pub struct MlpEncoderConfig {
    /// Number of values per observation (`channels * voxels`).
    pub in_features: usize,
    pub out_dim: usize,
    #[config(default = 64)]
    pub hidden_width: usize,
}

impl MlpEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpEncoder<B> {
        MlpEncoder {
            hidden: LinearConfig::new(self.in_features, self.hidden_width).init(device),
            output: LinearConfig::new(self.hidden_width, self.out_dim).init(device),
            activation: Relu::new(),
            in_features: self.in_features,
            out_dim: self.out_dim,
        }
    }
}

impl<B: Backend> MlpEncoder<B> {
    pub fn forward(&self, observations: Tensor<B, 5>) -> Tensor<B, 2> {
        let [batch, ..] = observations.dims();
        let x = observations.reshape([batch, self.in_features]);
        let x = self.activation.forward(self.hidden.forward(x));
        self.output.forward(x)
    }
}

impl<B: Backend> LatentEncoder<B> for MlpEncoder<B> {
    fn encode(&self, observations: Tensor<B, 5>) -> Tensor<B, 2> {
        self.forward(observations)
    }

    fn out_dim(&self) -> usize {
        self.out_dim
    }
}
