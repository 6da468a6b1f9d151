use burn::{
    nn::{Linear, LinearConfig, Relu},
    prelude::*,
    tensor::activation::tanh,
};

use crate::config::LastActivation;

/// Maps concatenated latent codes to a raw momentum field on the velocity grid.
pub trait MomentumDecoder<B: Backend> {
    /// `[B, latent]` -> `[B, dim, d, h, w]`
    fn decode(&self, latent: Tensor<B, 2>) -> Tensor<B, 5>;
}

/// Two-layer perceptron producing one vector per coarse grid point.
#[derive(Module, Debug)]
pub struct MlpDecoder<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
    channels: usize,
    depth: usize,
    height: usize,
    width: usize,
    bounded: bool,
}

#[derive(Config, Debug)]
pub struct MlpDecoderConfig {
    pub latent_dimension: usize,
    /// One channel per spatial dimension.
    pub channels: usize,
    /// Velocity grid as `[D, H, W]` (`D = 1` in 2D).
    pub grid_shape: [usize; 3],
    #[config(default = 64)]
    pub hidden_width: usize,
    #[config(default = "LastActivation::Identity")]
    pub last_activation: LastActivation,
}

impl MlpDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpDecoder<B> {
        let [depth, height, width] = self.grid_shape;
        let out_features = self.channels * depth * height * width;
        MlpDecoder {
            hidden: LinearConfig::new(self.latent_dimension, self.hidden_width).init(device),
            output: LinearConfig::new(self.hidden_width, out_features).init(device),
            activation: Relu::new(),
            channels: self.channels,
            depth,
            height,
            width,
            bounded: self.last_activation == LastActivation::Tanh,
        }
    }
}

impl<B: Backend> MlpDecoder<B> {
    pub fn forward(&self, latent: Tensor<B, 2>) -> Tensor<B, 5> {
        let [batch, _] = latent.dims();
        let x = self.activation.forward(self.hidden.forward(latent));
        let x = self
            .output
            .forward(x)
            .reshape([batch, self.channels, self.depth, self.height, self.width]);
        if self.bounded {
            tanh(x)
        } else {
            x
        }
    }
}

impl<B: Backend> MomentumDecoder<B> for MlpDecoder<B> {
    fn decode(&self, latent: Tensor<B, 2>) -> Tensor<B, 5> {
        self.forward(latent)
    }
}
