//! Component Construction
//!
//! Each simulation role (graph, logger, clock, activator, ...) is described
//! by a [`ComponentSpec`]: a factory, the parameter keys it recognises, and
//! static parameter overrides. A [`ComponentBuilder`] filters the global
//! parameter map down to those keys and invokes the factory.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use sim_agents::{AgentError, Params};

use crate::error::ComponentError;

type Factory<T> = Rc<dyn Fn(&Params) -> Result<T, AgentError>>;

/// Recipe for one component.
pub struct ComponentSpec<T> {
    name: String,
    factory: Option<Factory<T>>,
    options: BTreeSet<String>,
    parameters: Params,
    accepts_any: bool,
}

impl<T> ComponentSpec<T> {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&Params) -> Result<T, AgentError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Some(Rc::new(factory)),
            options: BTreeSet::new(),
            parameters: Params::new(),
            accepts_any: false,
        }
    }

    /// A role with no factory; building it fails.
    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: None,
            options: BTreeSet::new(),
            parameters: Params::new(),
            accepts_any: false,
        }
    }

    /// Adds recognised parameter keys.
    pub fn options<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Static overrides applied on top of the selected parameters.
    pub fn parameters(mut self, parameters: Params) -> Self {
        self.parameters.merge(&parameters);
        self
    }

    /// Passes the whole parameter map to the factory.
    pub fn accepting_any(mut self) -> Self {
        self.accepts_any = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_set(&self) -> bool {
        self.factory.is_some()
    }

    pub fn recognized(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(String::as_str)
    }

    /// The parameters the factory will see.
    pub fn select(&self, global: &Params) -> Params {
        let mut selected = if self.accepts_any {
            global.clone()
        } else {
            global.select(self.recognized())
        };
        selected.merge(&self.parameters);
        selected
    }
}

impl<T> Clone for ComponentSpec<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            factory: self.factory.clone(),
            options: self.options.clone(),
            parameters: self.parameters.clone(),
            accepts_any: self.accepts_any,
        }
    }
}

impl<T> fmt::Debug for ComponentSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("set", &self.is_set())
            .field("options", &self.options)
            .field("parameters", &self.parameters)
            .field("accepts_any", &self.accepts_any)
            .finish()
    }
}

/// Builds components against one effective parameter map.
#[derive(Debug, Clone, Copy)]
pub struct ComponentBuilder<'p> {
    parameters: &'p Params,
}

impl<'p> ComponentBuilder<'p> {
    pub fn new(parameters: &'p Params) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &'p Params {
        self.parameters
    }

    pub fn build<T>(&self, spec: &ComponentSpec<T>) -> Result<T, ComponentError> {
        let factory = spec
            .factory
            .as_ref()
            .ok_or_else(|| ComponentError::FactoryMissing(spec.name.clone()))?;
        let selected = spec.select(self.parameters);
        tracing::debug!(
            component = %spec.name,
            parameters = ?selected.keys().collect::<Vec<_>>(),
            "building component"
        );
        factory(&selected).map_err(|e| ComponentError::from_agent(&spec.name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> Params {
        Params::new()
            .with("steps", 10)
            .with("seed", 3)
            .with("unrelated", "x")
    }

    #[test]
    fn test_builder_filters_parameters() {
        let spec = ComponentSpec::new("counter", |p: &Params| Ok(p.clone())).options(["steps"]);
        let built = ComponentBuilder::new(&global()).build(&spec).unwrap();
        assert_eq!(built, Params::new().with("steps", 10));
    }

    #[test]
    fn test_static_parameters_win() {
        let spec = ComponentSpec::new("counter", |p: &Params| p.int("steps"))
            .options(["steps"])
            .parameters(Params::new().with("steps", 99));
        assert_eq!(ComponentBuilder::new(&global()).build(&spec).unwrap(), 99);
    }

    #[test]
    fn test_accepting_any_sees_everything() {
        let spec = ComponentSpec::new("all", |p: &Params| Ok(p.len())).accepting_any();
        assert_eq!(ComponentBuilder::new(&global()).build(&spec).unwrap(), 3);
    }

    #[test]
    fn test_errors_name_the_component() {
        let unset: ComponentSpec<()> = ComponentSpec::unset("observer");
        assert!(matches!(
            ComponentBuilder::new(&global()).build(&unset),
            Err(ComponentError::FactoryMissing(ref name)) if name == "observer"
        ));

        // "seed" is in the global map but not recognised, so the factory
        // never sees it
        let spec = ComponentSpec::new("clock", |p: &Params| p.int("seed")).options(["steps"]);
        assert!(matches!(
            ComponentBuilder::new(&global()).build(&spec),
            Err(ComponentError::MissingParameter { ref component, ref parameter })
                if component == "clock" && parameter == "seed"
        ));

        let spec = ComponentSpec::new("logger", |p: &Params| p.bool("unrelated"))
            .options(["unrelated"]);
        assert!(matches!(
            ComponentBuilder::new(&global()).build(&spec),
            Err(ComponentError::InvalidParameter { expected: "bool", .. })
        ));
    }
}
