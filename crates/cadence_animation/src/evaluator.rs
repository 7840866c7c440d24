//! Evaluators and the evaluator registry
//!
//! An [`Evaluator<T>`] blends two boundary values of type `T` given a
//! fraction in [0, 1]. Key frames resolve their evaluator either explicitly or
//! by looking up `T` in an [`EvaluatorRegistry`].
//!
//! The registry is an explicit object so tests and embedders can use an
//! isolated one. [`EvaluatorRegistry::global`] is the single process-wide
//! instance, populated with the built-in evaluators on first use; builders
//! fall back to it when no registry is supplied.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

/// Computes a value between `v0` and `v1`
///
/// Must be pure; one instance may be shared by many animators and invoked
/// concurrently.
pub trait Evaluator<T>: Send + Sync {
    fn evaluate(&self, v0: &T, v1: &T, fraction: f64) -> T;
}

impl<T, F> Evaluator<T> for F
where
    F: Fn(&T, &T, f64) -> T + Send + Sync,
{
    fn evaluate(&self, v0: &T, v1: &T, fraction: f64) -> T {
        self(v0, v1, fraction)
    }
}

// ============================================================================
// Built-in Evaluators
// ============================================================================

/// Linear blend for the primitive numeric types
///
/// Integer results truncate the interpolated delta toward zero, so the end
/// points are exact and `1 → 100` at 0.5 yields 50.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericEvaluator;

macro_rules! integer_evaluator {
    ($($t:ty),*) => {
        $(
            impl Evaluator<$t> for NumericEvaluator {
                fn evaluate(&self, v0: &$t, v1: &$t, fraction: f64) -> $t {
                    let delta = (*v1 as f64 - *v0 as f64) * fraction;
                    (*v0 as f64 + delta.trunc()) as $t
                }
            }
        )*
    };
}

integer_evaluator!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Evaluator<f64> for NumericEvaluator {
    fn evaluate(&self, v0: &f64, v1: &f64, fraction: f64) -> f64 {
        v0 + (v1 - v0) * fraction
    }
}

impl Evaluator<f32> for NumericEvaluator {
    fn evaluate(&self, v0: &f32, v1: &f32, fraction: f64) -> f32 {
        v0 + (v1 - v0) * fraction as f32
    }
}

/// Component-wise linear blend for fixed-size vectors, points, and colors
#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentEvaluator;

impl<const N: usize> Evaluator<[f32; N]> for ComponentEvaluator {
    fn evaluate(&self, v0: &[f32; N], v1: &[f32; N], fraction: f64) -> [f32; N] {
        let mut out = *v0;
        for (i, component) in out.iter_mut().enumerate() {
            *component += (v1[i] - v0[i]) * fraction as f32;
        }
        out
    }
}

impl<const N: usize> Evaluator<[f64; N]> for ComponentEvaluator {
    fn evaluate(&self, v0: &[f64; N], v1: &[f64; N], fraction: f64) -> [f64; N] {
        let mut out = *v0;
        for (i, component) in out.iter_mut().enumerate() {
            *component += (v1[i] - v0[i]) * fraction;
        }
        out
    }
}

impl Evaluator<(f64, f64)> for ComponentEvaluator {
    fn evaluate(&self, v0: &(f64, f64), v1: &(f64, f64), fraction: f64) -> (f64, f64) {
        (
            v0.0 + (v1.0 - v0.0) * fraction,
            v0.1 + (v1.1 - v0.1) * fraction,
        )
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Type-keyed table of evaluators
///
/// Each entry stores an `Arc<dyn Evaluator<T>>` erased behind `Any`; lookups
/// downcast back using the requested `T`.
pub struct EvaluatorRegistry {
    evaluators: RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl EvaluatorRegistry {
    /// A registry with nothing registered
    pub fn empty() -> Self {
        Self {
            evaluators: RwLock::new(FxHashMap::default()),
        }
    }

    /// A registry holding the built-in evaluators
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register_defaults();
        registry
    }

    /// The process-wide registry used when a builder has no registry of its own
    pub fn global() -> &'static EvaluatorRegistry {
        static GLOBAL_REGISTRY: OnceLock<EvaluatorRegistry> = OnceLock::new();
        GLOBAL_REGISTRY.get_or_init(EvaluatorRegistry::with_defaults)
    }

    /// Register (or replace) the evaluator used for `T`
    pub fn register<T, E>(&self, evaluator: E)
    where
        T: 'static,
        E: Evaluator<T> + 'static,
    {
        self.register_shared::<T>(Arc::new(evaluator));
    }

    /// Register an already shared evaluator for `T`
    pub fn register_shared<T: 'static>(&self, evaluator: Arc<dyn Evaluator<T>>) {
        tracing::debug!(
            "EvaluatorRegistry: register {}",
            std::any::type_name::<T>()
        );
        self.evaluators
            .write()
            .insert(TypeId::of::<T>(), Arc::new(evaluator));
    }

    /// Remove the evaluator for `T`, returning whether one was registered
    pub fn unregister<T: 'static>(&self) -> bool {
        self.evaluators.write().remove(&TypeId::of::<T>()).is_some()
    }

    /// Look up the evaluator registered for `T`
    pub fn lookup<T: 'static>(&self) -> Option<Arc<dyn Evaluator<T>>> {
        let entry = self.evaluators.read().get(&TypeId::of::<T>()).cloned()?;
        entry
            .downcast_ref::<Arc<dyn Evaluator<T>>>()
            .cloned()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.evaluators.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.evaluators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.read().is_empty()
    }

    fn register_defaults(&self) {
        macro_rules! numeric {
            ($($t:ty),*) => {
                $( self.register::<$t, _>(NumericEvaluator); )*
            };
        }
        numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

        self.register::<[f32; 2], _>(ComponentEvaluator);
        self.register::<[f32; 3], _>(ComponentEvaluator);
        self.register::<[f32; 4], _>(ComponentEvaluator);
        self.register::<[f64; 2], _>(ComponentEvaluator);
        self.register::<[f64; 3], _>(ComponentEvaluator);
        self.register::<[f64; 4], _>(ComponentEvaluator);
        self.register::<(f64, f64), _>(ComponentEvaluator);
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_truncates_delta() {
        assert_eq!(NumericEvaluator.evaluate(&1i32, &100, 0.0), 1);
        assert_eq!(NumericEvaluator.evaluate(&1i32, &100, 0.5), 50);
        assert_eq!(NumericEvaluator.evaluate(&1i32, &100, 1.0), 100);
        assert_eq!(NumericEvaluator.evaluate(&100u8, &0, 0.5), 50);
    }

    #[test]
    fn test_float_blend() {
        assert!((NumericEvaluator.evaluate(&10.0f64, &20.0, 0.25) - 12.5).abs() < 1e-9);
        assert!((NumericEvaluator.evaluate(&0.0f32, &1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_component_blend() {
        let mid = ComponentEvaluator.evaluate(&[0.0f32, 10.0, 20.0], &[10.0, 20.0, 40.0], 0.5);
        assert_eq!(mid, [5.0, 15.0, 30.0]);

        let point = ComponentEvaluator.evaluate(&(0.0, 0.0), &(4.0, -2.0), 0.25);
        assert_eq!(point, (1.0, -0.5));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = EvaluatorRegistry::with_defaults();
        assert!(registry.contains::<i32>());
        assert!(registry.contains::<f64>());
        assert!(registry.contains::<[f32; 4]>());
        assert!(!registry.contains::<String>());

        let eval = registry.lookup::<f64>().unwrap();
        assert_eq!(eval.evaluate(&0.0, &2.0, 0.5), 1.0);
    }

    #[test]
    fn test_registry_register_and_unregister() {
        let registry = EvaluatorRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.lookup::<String>().is_none());

        registry.register::<String, _>(|a: &String, b: &String, f: f64| {
            if f < 0.5 {
                a.clone()
            } else {
                b.clone()
            }
        });
        let eval = registry.lookup::<String>().unwrap();
        assert_eq!(eval.evaluate(&"a".into(), &"b".into(), 0.75), "b");

        assert!(registry.unregister::<String>());
        assert!(!registry.unregister::<String>());
        assert!(registry.lookup::<String>().is_none());
    }

    #[test]
    fn test_registry_replace() {
        let registry = EvaluatorRegistry::with_defaults();
        registry.register::<i32, _>(|_: &i32, _: &i32, _: f64| 7);
        assert_eq!(registry.lookup::<i32>().unwrap().evaluate(&0, &100, 0.5), 7);
    }
}
