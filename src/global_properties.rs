//! A generic mechanism for storing run-wide, read-only parameters.
//!
//! A global property is declared with `define_global_property!`, optionally
//! with a validation function. Values are validated when they are set and
//! can only be set once per `Context`, so every module of a run sees the same
//! resolved scenario.
use std::any::{Any, TypeId};

use log::trace;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::hashing::HashMap;

/// Defines a global property with the following parameters:
/// * `$global_property`: Name for the identifier type of the global property
/// * `$value`: The type of the property's value
/// * `$validate`: A function (or closure) that checks the validity of the property (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate: expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn name() -> &'static str {
                stringify!($global_property)
            }

            fn validate(val: &$value) -> Result<(), $crate::error::SimulationError> {
                $validate(val)
            }
        }
    };

    ($global_property: ident, $value: ty) => {
        $crate::define_global_property!($global_property, $value, |_| { Ok(()) });
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;

    fn name() -> &'static str;

    #[allow(clippy::missing_errors_doc)]
    fn validate(value: &Self::Value) -> Result<(), SimulationError>;
}

struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer {
        global_property_container: HashMap::default(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Validate and set the value of a global property.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the property, or
    /// `SimulationError::DuplicateGlobalProperty` if it was already set.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), SimulationError>;

    /// Return the value of a global property, or `None` if it was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), SimulationError> {
        trace!("setting global property {}", T::name());
        T::validate(&value)?;
        let data_container = self.get_data_container_mut(GlobalPropertiesPlugin);
        match data_container
            .global_property_container
            .entry(TypeId::of::<T>())
        {
            std::collections::hash_map::Entry::Occupied(_) => Err(
                SimulationError::DuplicateGlobalProperty(T::name().to_string()),
            ),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Box::new(value));
                Ok(())
            }
        }
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data_container(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T::Value>()
    }
}
