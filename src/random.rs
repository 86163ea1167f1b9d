//! Seeded random number streams.
//!
//! Every stochastic draw of a model run comes from a stream declared with
//! `define_rng!`. All streams of a `Context` derive from the single base seed
//! given to `init_random`: a stream is seeded with the base seed plus a hash
//! of its name the first time it is used. Draws within one stream are
//! consumed in the order the model makes them, so a run is reproducible from
//! its seed, and adding draws to one stream never shifts another.
use std::any::{Any, TypeId};
use std::cell::{RefCell, RefMut};

use log::trace;
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::distr::Distribution;
use rand::{Rng, SeedableRng};

use crate::context::Context;
use crate::define_data_plugin;
use crate::hashing::{hash_str, HashMap};

/// Use this to define a unique type which will be used as a key to retrieve
/// an independent rng instance when calling `Context::sample`.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }

        // This ensures that you can't define two RngIds with the same name
        $crate::paste::paste! {
            #[doc(hidden)]
            #[no_mangle]
            #[allow(non_upper_case_globals)]
            pub static [<rng_name_duplication_guard_ $random_id>]: () = ();
        }
    };
}
pub use define_rng;

pub trait RngId: Copy + Clone + Any {
    type RngType: SeedableRng + 'static;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for different types of random number
// generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: Option<u64>,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: A base seed for all rngs
// * rng_holders: A map of rngs, keyed by their RngId. Note that this is
//   stored in a RefCell to allow for mutable borrow without requiring a
//   mutable borrow of the Context itself.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: None,
        rng_holders: RefCell::new(HashMap::default()),
    }
);

/// Gets a mutable reference to the random number generator associated with the given
/// [`RngId`]. If the Rng has not been used before, one will be created with the base seed
/// you defined in `init_random`. Note that this will panic if `init_random` was not called yet.
fn get_rng<R: RngId>(context: &Context) -> RefMut<'_, R::RngType> {
    let data_container = context
        .get_data_container(RngPlugin)
        .expect("You must initialize the random number generator with a base seed");
    let base_seed = data_container
        .base_seed
        .expect("You must initialize the random number generator with a base seed");

    let rng_holders = data_container.rng_holders.borrow_mut();
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            // Create a new rng holder if it doesn't exist yet
            .or_insert_with(|| {
                trace!(
                    "creating new RNG (seed={}) for {}",
                    base_seed,
                    R::get_name()
                );
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            // Holders are keyed by the `RngId` type that created them.
            .unwrap()
    })
}

// This is a trait extension on Context for
// random number generation functionality.
pub trait ContextRandomExt {
    /// Sets the base seed for all rngs. Rngs are created lazily when first
    /// sampled; calling this again resets every stream.
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the random number generator associated with the given
    /// [`RngId`] by applying the specified sampler function.
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from the specified distribution using the random number
    /// generator associated with the given [`RngId`].
    fn sample_distr<R: RngId, T>(&self, rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| distribution.sample(rng))
    }

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given [`RngId`].
    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    /// Gets a random boolean value which is true with probability `p`
    /// using the generator associated with the given [`RngId`].
    ///
    /// Probabilities are validated when a scenario is resolved, so `p` is
    /// always in `[0, 1]` here.
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with base seed {base_seed}");
        let data_container = self.get_data_container_mut(RngPlugin);
        data_container.base_seed = Some(base_seed);

        // Clear any existing Rngs to ensure they get re-seeded when first sampled
        data_container.rng_holders.get_mut().clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    #[should_panic(expected = "You must initialize the random number generator with a base seed")]
    fn panic_if_not_initialized() {
        let context = Context::new();
        context.sample(FooRng, RngCore::next_u64);
    }

    #[test]
    fn multiple_rng_types() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(7);
        let foo_alone: Vec<u64> = (0..5).map(|_| context.sample(FooRng, RngCore::next_u64)).collect();

        context.init_random(7);
        let mut foo_interleaved = Vec::new();
        for _ in 0..5 {
            context.sample(BarRng, RngCore::next_u64);
            foo_interleaved.push(context.sample(FooRng, RngCore::next_u64));
        }
        assert_eq!(foo_alone, foo_interleaved);
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample(FooRng, RngCore::next_u64);
        let run_1 = context.sample(FooRng, RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(FooRng, RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_ne!(run_1, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn sample_range() {
        let mut context = Context::new();
        context.init_random(42);
        let result = context.sample_range(FooRng, 0..10);
        assert!((0..10).contains(&result));
    }

    #[test]
    fn sample_bool_extremes() {
        let mut context = Context::new();
        context.init_random(42);
        assert!(context.sample_bool(FooRng, 1.0));
        assert!(!context.sample_bool(FooRng, 0.0));
    }

    #[test]
    fn sample_bool_frequency() {
        let mut context = Context::new();
        context.init_random(42);
        let hits = (0..3000)
            .filter(|_| context.sample_bool(FooRng, 0.3))
            .count();
        // The expected value of `hits` is 900.
        assert!((800..1000).contains(&hits));
    }
}
