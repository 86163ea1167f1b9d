//! The `Context` owns the state of one model run: the simulated clock, the
//! queue of scheduled plans, and the data containers of every model module.
//!
//! Model modules never share globals. Each one registers a data plugin with
//! `define_data_plugin!` and reaches its data through the `Context`, usually
//! behind a `Context*Ext` extension trait.
use std::any::{Any, TypeId};
use std::rc::Rc;

use log::trace;

use crate::hashing::HashMap;
use crate::plan::{ExecutionPhase, Queue};

/// A trait for objects that can provide data containers to be held by `Context`
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in Context.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context);

/// A manager for the state of a discrete-time simulation
///
/// Plans are callbacks scheduled at a simulated time (one unit is one day).
/// `execute` runs them in time order, then `ExecutionPhase`, then insertion
/// order, until no plans remain or `shutdown` is called.
pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    /// Create a new empty `Context`
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Add a plan to be executed at the given `time` in the `Normal` phase
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Add a plan to be executed at the given `time` in the given `phase`
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Time {time} is invalid"
        );
        self.plan_queue.add_plan(time, Box::new(callback), phase);
    }

    /// Add a plan that runs now and then every `period` in the given `phase`
    ///
    /// The plan keeps rescheduling itself until `shutdown` is called, so a
    /// model using periodic plans must schedule its own end.
    ///
    /// # Panics
    ///
    /// Panics if `period` is not a positive, finite number.
    pub fn add_periodic_plan_with_phase(
        &mut self,
        period: f64,
        callback: impl Fn(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            period > 0.0 && period.is_finite(),
            "Period {period} must be positive and finite"
        );
        let callback: Rc<dyn Fn(&mut Context)> = Rc::new(callback);
        self.schedule_periodic_plan(self.current_time, period, callback, phase);
    }

    fn schedule_periodic_plan(
        &mut self,
        time: f64,
        period: f64,
        callback: Rc<dyn Fn(&mut Context)>,
        phase: ExecutionPhase,
    ) {
        self.add_plan_with_phase(
            time,
            move |context| {
                callback(context);
                if !context.shutdown_requested {
                    context.schedule_periodic_plan(time + period, period, callback, phase);
                }
            },
            phase,
        );
    }

    /// Stop the run once the current plan returns; remaining plans are dropped
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at {}", self.current_time);
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Returns a mutable reference to the data container of `plugin`, creating
    /// it if it doesn't exist yet.
    #[allow(clippy::missing_panics_doc)]
    pub fn get_data_container_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            // The entry was created from `T` so the downcast cannot fail.
            .unwrap()
    }

    /// Returns a reference to the data container of `plugin` if it exists.
    #[must_use]
    pub fn get_data_container<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Execute plans until none remain or `shutdown` is called
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            if self.shutdown_requested {
                self.plan_queue.clear();
                break;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                #[cfg(feature = "progress_bar")]
                crate::progress::update_timeline_progress(self.current_time);
                (plan.data)(self);
            } else {
                // OK, there aren't any plans, so we're done.
                break;
            }
        }
        trace!("exiting event loop at {}", self.current_time);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
