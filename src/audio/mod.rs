pub mod capture;
pub mod detector;
pub mod onset;
pub mod smoother;

/// One fixed-length block of mono samples, owned by a single pipeline pass.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}
