//! Monte Carlo approximation of the efficient frontier.

pub mod sampler;

pub use sampler::{
    generate_frontier, sample_frontier, DirichletSource, EnvelopePoint, FrontierSample,
    FrontierSampleSet,
};
