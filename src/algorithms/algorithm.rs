//! This module provides the `Algorithm` trait and the structures shared by all restoration
//! methods: their metadata, the `Plan` they produce for a concrete problem, the `Solver`
//! interface of iterative methods, and a registry that resolves methods by name.

use crate::error::{DeconvError, Result};
use crate::signal::RealBuffer;
use crate::spectral::Workspace;
use serde::Serialize;
use std::fmt::Debug;

/// The `Algorithm` trait defines the structure and behavior of a restoration method.
///
/// Algorithms must implement:
/// - A `new` function to initialize the method with its default parameters.
/// - A `config` function to provide its metadata.
/// - `parameters`, `default_parameters` and `set_parameters` for its numeric parameter
///   vector.
/// - A `prepare` function that precomputes everything the method needs for one problem
///   and returns either the finished result or an iterative [`Solver`].
///
/// An algorithm never decides when to stop. Iterative methods hand a `Solver` back to
/// the engine, which steps it and consults the controller after every step.
///
/// **Example**:
/// ```rust,ignore
/// #[derive(Clone, Debug)]
/// struct Doubling;
///
/// impl Algorithm for Doubling {
///     fn new() -> Self { Doubling }
///
///     fn config(&self) -> AlgorithmConfig {
///         AlgorithmConfig::direct("Doubling", &["X2"], "Multiplies the image by two.")
///     }
///
///     fn parameters(&self) -> Vec<f64> { vec![] }
///
///     fn default_parameters(&self) -> Vec<f64> { vec![] }
///
///     fn set_parameters(&mut self, _values: &[f64]) -> Result<()> { Ok(()) }
///
///     fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
///         let mut x = ws.duplicate_real("x", problem.image);
///         x.scale(2.0);
///         Ok(Plan::Direct(x))
///     }
/// }
/// ```
pub trait Algorithm: Send + Sync + Debug + CloneBoxedAlgorithm {
    /// Creates a new instance with default parameters.
    fn new() -> Self
    where
        Self: Sized;

    /// Returns the metadata of the method.
    fn config(&self) -> AlgorithmConfig;

    /// Current parameter vector, in the order of `config().parameter_names`.
    fn parameters(&self) -> Vec<f64>;

    /// Deterministic default parameter vector.
    fn default_parameters(&self) -> Vec<f64>;

    /// Overwrites the leading parameters with `values`. Missing values keep their
    /// current setting, surplus values are ignored.
    fn set_parameters(&mut self, values: &[f64]) -> Result<()>;

    /// Precomputes the method for `problem`.
    ///
    /// # Arguments
    /// - `problem`: padded/apodized image and the prepared, origin-centred PSF.
    /// - `ws`: transform, buffer pool and epsilon of the run.
    ///
    /// # Returns
    /// `Plan::Direct` with the finished estimate or `Plan::Iterative` with a solver
    /// positioned at its initial estimate.
    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan>;
}

/// Inputs of one restoration, both of the working (padded) shape.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    pub image: &'a RealBuffer,
    pub psf: &'a RealBuffer,
}

/// Result of [`Algorithm::prepare`].
#[derive(Debug)]
pub enum Plan {
    Direct(RealBuffer),
    Iterative(Box<dyn Solver>),
}

/// State of an iterative method between two iterations.
pub trait Solver: Send + Debug {
    /// Performs one iteration.
    fn step(&mut self, ws: &mut Workspace) -> Result<()>;

    /// The current estimate in the spatial domain, as a new pooled buffer.
    fn estimate(&mut self, ws: &mut Workspace) -> Result<RealBuffer>;

    /// Replaces the current estimate by `x`, typically after a constraint was projected
    /// onto it.
    fn restore(&mut self, ws: &mut Workspace, x: &RealBuffer) -> Result<()>;

    /// Returns the final estimate and releases every internal buffer.
    fn finish(self: Box<Self>, ws: &mut Workspace) -> Result<RealBuffer>;
}

/// A structure representing the metadata of an algorithm.
///
/// # Fields
/// - `name`: A human-readable name, used for identification and display.
/// - `short_names`: Abbreviations the registry also resolves (e.g. `RL`).
/// - `description`: What the method does.
/// - `reference`: Optional DOI or reference for the method.
/// - `parameter_names`: Names of the entries of the parameter vector.
/// - `iterative`, `regularized`, `step_controllable`, `wavelet_based`: capabilities.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AlgorithmConfig {
    pub name: String,
    pub short_names: Vec<String>,
    pub description: String,
    pub reference: Option<String>,
    pub parameter_names: Vec<String>,
    pub iterative: bool,
    pub regularized: bool,
    pub step_controllable: bool,
    pub wavelet_based: bool,
}

impl AlgorithmConfig {
    /// Metadata of a non-iterative method without parameters.
    pub fn direct(name: &str, short_names: &[&str], description: &str) -> Self {
        AlgorithmConfig {
            name: name.to_string(),
            short_names: short_names.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
            reference: None,
            parameter_names: Vec::new(),
            iterative: false,
            regularized: false,
            step_controllable: false,
            wavelet_based: false,
        }
    }

    pub fn reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    pub fn parameters(mut self, names: &[&str]) -> Self {
        self.parameter_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn iterative(mut self) -> Self {
        self.iterative = true;
        self
    }

    pub fn regularized(mut self) -> Self {
        self.regularized = true;
        self
    }

    pub fn step_controllable(mut self) -> Self {
        self.step_controllable = true;
        self
    }

    pub fn wavelet_based(mut self) -> Self {
        self.wavelet_based = true;
        self
    }

    /// Whether `name` refers to this method, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.short_names.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

/// Copies `values` over the leading entries of `target`, rejecting non-finite values.
pub(crate) fn assign_parameters(algorithm: &str, target: &mut [f64], values: &[f64]) -> Result<()> {
    if values.len() > target.len() {
        log::warn!(
            "{algorithm} takes {} parameters, ignoring {} surplus values",
            target.len(),
            values.len() - target.len()
        );
    }
    for (t, v) in target.iter_mut().zip(values) {
        if !v.is_finite() {
            return Err(DeconvError::Parameter(format!(
                "{algorithm}: parameter value {v} is not finite"
            )));
        }
        *t = *v;
    }
    Ok(())
}

/// Rejects `value <= 0`.
pub(crate) fn check_positive(algorithm: &str, name: &str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(DeconvError::Parameter(format!(
            "{algorithm}: {name} must be positive, got {value}"
        )))
    }
}

/// Rejects `value < 0`.
pub(crate) fn check_non_negative(algorithm: &str, name: &str, value: f64) -> Result<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(DeconvError::Parameter(format!(
            "{algorithm}: {name} must not be negative, got {value}"
        )))
    }
}

/// A trait to allow cloning of boxed algorithms.
/// This is necessary because `Box<dyn Algorithm>` cannot be cloned directly.
pub trait CloneBoxedAlgorithm {
    fn clone_box(&self) -> Box<dyn Algorithm>;
}

impl<T> CloneBoxedAlgorithm for T
where
    T: 'static + Algorithm + Clone,
{
    fn clone_box(&self) -> Box<dyn Algorithm> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Algorithm> {
    fn clone(&self) -> Box<dyn Algorithm> {
        self.as_ref().clone_box()
    }
}

/// A registry to manage and retrieve algorithms by name or abbreviation.
///
/// **Example**:
/// ```rust
/// use spectral_deconv::algorithms::AlgorithmRegistry;
///
/// let registry = AlgorithmRegistry::with_builtins();
/// let rl = registry.create("rl").unwrap();
/// assert_eq!(rl.config().name, "Richardson-Lucy");
/// ```
#[derive(Debug, Default)]
pub struct AlgorithmRegistry {
    algorithms: Vec<Box<dyn Algorithm>>,
}

impl AlgorithmRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new algorithm of type `A`, instantiated with its defaults.
    pub fn register<A: Algorithm + 'static>(&mut self) {
        let algorithm = A::new();
        let name = algorithm.config().name;
        if self.algorithms.iter().any(|a| a.config().name == name) {
            log::warn!("algorithm {name} registered twice, keeping the first");
            return;
        }
        self.algorithms.push(Box::new(algorithm));
    }

    /// Retrieves a fresh copy of the algorithm called `name`.
    pub fn get(&self, name: &str) -> Option<Box<dyn Algorithm>> {
        self.algorithms
            .iter()
            .find(|a| a.config().matches(name))
            .cloned()
    }

    /// Like `get`, but fails with `UnknownAlgorithm`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Algorithm>> {
        self.get(name)
            .ok_or_else(|| DeconvError::UnknownAlgorithm(name.to_string()))
    }

    /// Names of all registered algorithms, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.algorithms.iter().map(|a| a.config().name).collect()
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

impl<'a> IntoIterator for &'a AlgorithmRegistry {
    type Item = &'a Box<dyn Algorithm>;
    type IntoIter = std::slice::Iter<'a, Box<dyn Algorithm>>;

    fn into_iter(self) -> Self::IntoIter {
        self.algorithms.iter()
    }
}
