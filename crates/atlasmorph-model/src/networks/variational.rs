use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::Distribution,
};

/// Reparametrization trick: `mu + eps * exp(log_var / 2)` with `eps ~ N(0, 1)`.
pub fn reparametrize<B: Backend, const D: usize>(
    mu: Tensor<B, D>,
    log_var: Tensor<B, D>,
) -> Tensor<B, D> {
    let std = log_var.mul_scalar(0.5).exp();
    let eps = Tensor::random(mu.shape(), Distribution::Normal(0.0, 1.0), &mu.device());
    mu + eps * std
}

/// Gaussian posterior head: features -> `(mu, log_var)`.
#[derive(Module, Debug)]
pub struct VariationalHead<B: Backend> {
    mu: Linear<B>,
    log_var: Linear<B>,
}

#[derive(Config, Debug)]
pub struct VariationalHeadConfig {
    pub in_dim: usize,
    pub out_dim: usize,
}

impl VariationalHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> VariationalHead<B> {
        VariationalHead {
            mu: LinearConfig::new(self.in_dim, self.out_dim).init(device),
            log_var: LinearConfig::new(self.in_dim, self.out_dim).init(device),
        }
    }
}

impl<B: Backend> VariationalHead<B> {
    /// `[B, in_dim]` -> (`mu`, `log_var`), each `[B, out_dim]`.
    pub fn forward(&self, features: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (self.mu.forward(features.clone()), self.log_var.forward(features))
    }

    /// Draw one sample from the posterior.
    pub fn sample(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let (mu, log_var) = self.forward(features);
        reparametrize(mu, log_var)
    }
}
