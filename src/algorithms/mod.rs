//! Restoration methods.
//!
//! Each method lives in its own file and implements [`Algorithm`]. Direct
//! methods compute their result in `prepare`; iterative ones return a
//! [`Solver`] that the engine steps until the controller stops it.

pub mod algorithm;
mod convolution;
mod fixed_point;
mod identity;
mod ista;
mod landweber;
mod naive_inverse;
mod regularized_inverse;
mod richardson_lucy;
mod richardson_lucy_tv;
mod tikhonov_miller;
mod van_cittert;
pub mod wavelets;

pub use algorithm::{Algorithm, AlgorithmConfig, AlgorithmRegistry, Plan, Problem, Solver};
pub use convolution::Convolution;
pub use fixed_point::{FixedPoint, Projection};
pub use identity::Identity;
pub use ista::{Fista, Ista, WaveletParameters};
pub use landweber::{BoundedVariableLeastSquares, Landweber, NonNegativeLeastSquares};
pub use naive_inverse::NaiveInverseFilter;
pub use regularized_inverse::{RegularizedInverseFilter, TikhonovRegularizedInverseFilter};
pub use richardson_lucy::RichardsonLucy;
pub use richardson_lucy_tv::RichardsonLucyTotalVariation;
pub use tikhonov_miller::{IterativeConstrainedTikhonovMiller, TikhonovMiller};
pub use van_cittert::VanCittert;

impl AlgorithmRegistry {
    /// Registry holding every built-in method.
    pub fn with_builtins() -> Self {
        let mut registry = AlgorithmRegistry::new();
        registry.register::<RichardsonLucy>();
        registry.register::<RichardsonLucyTotalVariation>();
        registry.register::<Landweber>();
        registry.register::<NonNegativeLeastSquares>();
        registry.register::<BoundedVariableLeastSquares>();
        registry.register::<VanCittert>();
        registry.register::<TikhonovMiller>();
        registry.register::<IterativeConstrainedTikhonovMiller>();
        registry.register::<Ista>();
        registry.register::<Fista>();
        registry.register::<NaiveInverseFilter>();
        registry.register::<RegularizedInverseFilter>();
        registry.register::<TikhonovRegularizedInverseFilter>();
        registry.register::<Convolution>();
        registry.register::<Identity>();
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_ignores_case_and_accepts_short_names() {
        let registry = AlgorithmRegistry::with_builtins();
        assert_eq!(registry.len(), 15);
        assert_eq!(registry.create("rl").unwrap().config().name, "Richardson-Lucy");
        assert_eq!(registry.create("richardson-lucy").unwrap().config().name, "Richardson-Lucy");
        assert_eq!(registry.create("Tm").unwrap().config().name, "Tikhonov-Miller");
        assert_eq!(registry.create("lrif").unwrap().config().name, "Regularized Inverse Filter");
        assert!(registry.create("Wiener").is_err());
        assert!(matches!(
            registry.create("nope"),
            Err(crate::error::DeconvError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_names_and_short_names_are_unique() {
        let registry = AlgorithmRegistry::with_builtins();
        let mut seen = HashSet::new();
        for algorithm in &registry {
            let config = algorithm.config();
            for name in std::iter::once(&config.name).chain(&config.short_names) {
                assert!(seen.insert(name.to_lowercase()), "{name} is ambiguous");
            }
        }
    }

    #[test]
    fn test_metadata_is_consistent() {
        for algorithm in &AlgorithmRegistry::with_builtins() {
            let config = algorithm.config();
            assert_eq!(
                config.parameter_names.len(),
                algorithm.default_parameters().len(),
                "{}",
                config.name
            );
            assert_eq!(algorithm.parameters(), algorithm.default_parameters());
            if config.step_controllable || config.wavelet_based {
                assert!(config.iterative, "{}", config.name);
            }
        }
    }

    #[test]
    fn test_get_returns_independent_copies() {
        let registry = AlgorithmRegistry::with_builtins();
        let mut first = registry.create("LW").unwrap();
        first.set_parameters(&[0.5]).unwrap();
        assert_eq!(registry.create("LW").unwrap().parameters(), vec![1.0]);
    }

    #[test]
    fn test_register_keeps_the_first_of_duplicates() {
        let mut registry = AlgorithmRegistry::new();
        assert!(registry.is_empty());
        registry.register::<Identity>();
        registry.register::<Identity>();
        assert_eq!(registry.names(), vec!["Identity".to_string()]);
    }
}
