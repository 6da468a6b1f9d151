use atlasmorph_core::{DiffeoError, GridSize, Result, Volume};
use burn::{module::Param, prelude::*};

use crate::config::DiffeoVaeConfig;
use crate::networks::{
    MlpDecoder, MlpDecoderConfig, MlpEncoder, MlpEncoderConfig, VariationalHead,
    VariationalHeadConfig,
};

/// Every learned tensor of the model, as one burn record.
///
/// The atlas is an ordinary parameter: the host optimizer updates it together
/// with the networks, and `Module::save_file`/`load_record` persist it.
#[derive(Module, Debug)]
pub struct VaeParameters<B: Backend> {
    /// Observation -> disease stage `[B, 1]`.
    pub time_encoder: MlpEncoder<B>,
    /// Observation -> spatial code `[B, latent - 1]`.
    pub space_encoder: MlpEncoder<B>,
    /// Disease stage -> posterior `(mu, log_var)` over the stage.
    pub psi_head: VariationalHead<B>,
    /// Latent code -> momentum field on the velocity grid.
    pub decoder: MlpDecoder<B>,
    /// Reference image `[1, C, D, H, W]`.
    pub atlas: Param<Tensor<B, 5>>,
}

impl<B: Backend> VaeParameters<B> {
    /// Initialise the networks for `initial_atlas` and take the atlas as a parameter.
    pub fn init(
        config: &DiffeoVaeConfig,
        initial_atlas: Volume<B>,
        velocity_grid: &GridSize,
        device: &B::Device,
    ) -> Result<Self> {
        if initial_atlas.batch_size() != 1 {
            let mut expected = initial_atlas.shape();
            expected[0] = 1;
            return Err(DiffeoError::shape_mismatch(&expected, &initial_atlas.shape()));
        }
        let channels = initial_atlas.channels();
        let in_features = channels * initial_atlas.grid().num_points();
        let hidden_width = config.network_size.hidden_width();

        let time_encoder = MlpEncoderConfig::new(in_features, 1)
            .with_hidden_width(hidden_width)
            .init(device);
        let space_encoder = MlpEncoderConfig::new(in_features, config.spatial_latent_dimension())
            .with_hidden_width(hidden_width)
            .init(device);
        let psi_head = VariationalHeadConfig::new(1, 1).init(device);
        let decoder = MlpDecoderConfig::new(
            config.latent_dimension,
            velocity_grid.dimension(),
            velocity_grid.volume_shape(),
        )
        .with_hidden_width(hidden_width)
        .with_last_activation(config.decoder_last_activation)
        .init(device);

        let atlas = initial_atlas.into_data().to_device(device);

        Ok(Self {
            time_encoder,
            space_encoder,
            psi_head,
            decoder,
            atlas: Param::from_tensor(atlas),
        })
    }

    /// Current atlas value.
    pub fn atlas(&self) -> Tensor<B, 5> {
        self.atlas.val()
    }
}
