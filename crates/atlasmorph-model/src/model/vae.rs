use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use atlasmorph_core::validation::max_abs;
use atlasmorph_core::{DiffeoError, GridSize, Result, Volume};
use burn::prelude::*;

use super::params::VaeParameters;
use crate::config::{AnchoringMode, DiffeoVaeConfig};
use crate::deformation::{DecodeOutput, DeformationEngine};
use crate::networks::{reparametrize, LatentEncoder, PermutationPooling};
use crate::observer::{DecodeInfo, DecodeObserver, NoopObserver};

/// Encoding of the atlas itself, subtracted from every code in
/// [`AnchoringMode::AtlasAnchored`].
#[derive(Debug, Clone)]
pub struct AtlasAnchors<B: Backend> {
    /// `[1, 1]`
    pub psi: Tensor<B, 2>,
    /// `[1, latent - 1]`
    pub s: Tensor<B, 2>,
}

/// Posterior over the disease stage plus the deterministic spatial code.
#[derive(Debug, Clone)]
pub struct VariationalCode<B: Backend> {
    /// `[B, 1]`
    pub psi_mu: Tensor<B, 2>,
    /// `[B, 1]`
    pub psi_log_var: Tensor<B, 2>,
    /// `[B, latent - 1]`
    pub s: Tensor<B, 2>,
}

/// Diffeomorphic variational autoencoder with a learned atlas.
///
/// Observations are encoded into a disease stage `psi` and a spatial code `s`.
/// Decoding maps `[psi, s]` to a momentum field, smooths it into a velocity,
/// integrates it into a diffeomorphism and warps the atlas with it.
pub struct DiffeoVae<B: Backend> {
    params: VaeParameters<B>,
    engine: DeformationEngine,
    pooling: PermutationPooling,
    config: DiffeoVaeConfig,
    observer: Arc<dyn DecodeObserver>,
    decode_count: AtomicUsize,
}

impl DiffeoVaeConfig {
    /// Build a model around `initial_atlas` (`[1, C, *grid]`).
    pub fn init<B: Backend>(&self, initial_atlas: Volume<B>, device: &B::Device) -> Result<DiffeoVae<B>> {
        DiffeoVae::new(self.clone(), initial_atlas, device)
    }
}

impl<B: Backend> DiffeoVae<B> {
    pub fn new(config: DiffeoVaeConfig, initial_atlas: Volume<B>, device: &B::Device) -> Result<Self> {
        let engine = DeformationEngine::new(&config, initial_atlas.grid())?;
        let params = VaeParameters::init(&config, initial_atlas, engine.velocity_grid(), device)?;

        tracing::info!(
            "Atlas shape {:?} ({}D), velocity grid {:?}",
            params.atlas.val().dims(),
            engine.grid().dimension(),
            engine.velocity_grid().extents()
        );
        tracing::info!(
            "Parameters: time encoder {}, space encoder {}, decoder {}, total {}",
            params.time_encoder.num_params(),
            params.space_encoder.num_params(),
            params.decoder.num_params(),
            params.num_params()
        );
        tracing::info!(
            "Anchoring {:?}, isometry {}, {} time points, kernel width {}",
            config.anchoring,
            config.isometry_constraint,
            config.number_of_time_points,
            config.deformation_kernel_width
        );

        Ok(Self {
            params,
            engine,
            pooling: PermutationPooling::new(config.pi_mode),
            config,
            observer: Arc::new(NoopObserver),
            decode_count: AtomicUsize::new(0),
        })
    }

    /// Report every decode to `observer`.
    pub fn with_observer(mut self, observer: impl DecodeObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &DiffeoVaeConfig {
        &self.config
    }

    pub fn engine(&self) -> &DeformationEngine {
        &self.engine
    }

    pub fn grid(&self) -> &GridSize {
        self.engine.grid()
    }

    pub fn anchoring(&self) -> AnchoringMode {
        self.config.anchoring
    }

    pub fn params(&self) -> &VaeParameters<B> {
        &self.params
    }

    pub fn into_params(self) -> VaeParameters<B> {
        self.params
    }

    /// Swap in updated parameters, e.g. after an optimizer step.
    pub fn with_params(mut self, params: VaeParameters<B>) -> Result<Self> {
        let expected = self.params.atlas.val().dims();
        let actual = params.atlas.val().dims();
        if expected != actual {
            return Err(DiffeoError::shape_mismatch(&expected, &actual));
        }
        self.params = params;
        Ok(self)
    }

    /// Current atlas.
    pub fn atlas(&self) -> Result<Volume<B>> {
        Volume::new(self.params.atlas(), self.grid().clone())
    }

    /// Number of decodes since construction.
    pub fn decode_count(&self) -> usize {
        self.decode_count.load(Ordering::Relaxed)
    }

    fn check_observations(&self, observations: &Volume<B>) -> Result<()> {
        let channels = self.params.atlas.val().dims()[1];
        if observations.grid() != self.grid() || observations.channels() != channels {
            let mut expected = vec![observations.batch_size(), channels];
            expected.extend_from_slice(self.grid().extents());
            return Err(DiffeoError::shape_mismatch(&expected, &observations.shape()));
        }
        Ok(())
    }

    fn encode_raw(&self, observations: Tensor<B, 5>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let psi = self.params.time_encoder.encode(observations.clone());
        let s = self.params.space_encoder.encode(observations);
        (psi, s)
    }

    /// Codes of the (detached) atlas.
    pub fn atlas_anchors(&self) -> AtlasAnchors<B> {
        let (psi, s) = self.encode_raw(self.params.atlas().detach());
        AtlasAnchors { psi, s }
    }

    /// Encode observations `[B, C, *grid]` into `(psi [B, 1], s [B, latent - 1])`.
    pub fn encode(&self, observations: &Volume<B>) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        self.check_observations(observations)?;
        let (psi, s) = self.encode_raw(observations.data().clone());

        match self.config.anchoring {
            AnchoringMode::Referential => Ok((psi, s)),
            AnchoringMode::AtlasAnchored => {
                let batch_size = observations.batch_size();
                let anchors = self.atlas_anchors();
                Ok((
                    psi - anchors.psi.repeat(&[batch_size, 1]),
                    s - anchors.s.repeat(&[batch_size, 1]),
                ))
            }
        }
    }

    /// Encode observations into a Gaussian posterior over `psi`.
    pub fn encode_variational(&self, observations: &Volume<B>) -> Result<VariationalCode<B>> {
        let (psi, s) = self.encode(observations)?;
        let (psi_mu, psi_log_var) = self.params.psi_head.forward(psi);
        Ok(VariationalCode {
            psi_mu,
            psi_log_var,
            s,
        })
    }

    /// Sample latent codes `[B, latent]` for observations, drawing `psi` from its posterior.
    pub fn sample_latent(&self, observations: &Volume<B>) -> Result<Tensor<B, 2>> {
        let code = self.encode_variational(observations)?;
        let psi = reparametrize(code.psi_mu, code.psi_log_var);
        Ok(Tensor::cat(vec![psi, code.s], 1))
    }

    /// Encode all visits of one subject into a single, order-independent code
    /// `(psi [1, 1], s [1, latent - 1])`.
    pub fn encode_subject(&self, visits: &Volume<B>) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let (psi, s) = self.encode(visits)?;
        Ok((self.pooling.pool(psi), self.pooling.pool(s)))
    }

    /// Decode latent codes `[B, latent]` into warped atlases `[B, C, *grid]`.
    pub fn decode(&self, z: Tensor<B, 2>) -> Result<Volume<B>> {
        self.decode_detailed(z).map(|output| output.reconstruction)
    }

    /// Like [`Self::decode`], keeping the velocity and the diffeomorphism.
    pub fn decode_detailed(&self, z: Tensor<B, 2>) -> Result<DecodeOutput<B>> {
        let decode_index = self.decode_count.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        let batch_size = z.dims()[0];

        let output = match self
            .engine
            .decode_with(&self.params.decoder, self.params.atlas(), z)
        {
            Ok(output) => output,
            Err(err) => {
                self.observer.on_error(decode_index, &err);
                return Err(err);
            }
        };

        let (max_velocity, max_displacement) = if self.observer.wants_statistics() {
            let identity = self
                .engine
                .integrator()
                .identity::<B>(batch_size, &output.diffeomorphism.device());
            (
                Some(max_abs(output.velocity.data())),
                Some(max_abs(&(output.diffeomorphism.data().clone() - identity))),
            )
        } else {
            (None, None)
        };

        self.observer.on_decode(&DecodeInfo {
            decode_index,
            batch_size,
            anchoring: self.config.anchoring,
            isometry: self.engine.isometry_enabled(),
            max_velocity,
            max_displacement,
            elapsed: start.elapsed(),
        });

        Ok(output)
    }

    /// Encode observations and decode them again.
    pub fn reconstruct(&self, observations: &Volume<B>) -> Result<Volume<B>> {
        let (psi, s) = self.encode(observations)?;
        self.decode(Tensor::cat(vec![psi, s], 1))
    }
}

impl<B: Backend> fmt::Debug for DiffeoVae<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffeoVae")
            .field("config", &self.config)
            .field("grid", self.grid())
            .field("decode_count", &self.decode_count())
            .finish_non_exhaustive()
    }
}
