//! Parameter layering.
//!
//! The effective parameter map is the overlay, lowest first, of factory
//! defaults, the config file, the command line, and call-site overrides.

use std::fmt;

use sim_agents::{Params, Value};

/// Origin of a parameter value, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Defaults,
    File,
    CommandLine,
    Overrides,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::Defaults,
        Layer::File,
        Layer::CommandLine,
        Layer::Overrides,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Defaults => write!(f, "defaults"),
            Layer::File => write!(f, "file"),
            Layer::CommandLine => write!(f, "command line"),
            Layer::Overrides => write!(f, "overrides"),
        }
    }
}

/// The four parameter layers of a simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSources {
    layers: [Params; 4],
}

impl ParameterSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer: Layer) -> &Params {
        &self.layers[layer.index()]
    }

    pub fn layer_mut(&mut self, layer: Layer) -> &mut Params {
        &mut self.layers[layer.index()]
    }

    /// Replaces a whole layer.
    pub fn set(&mut self, layer: Layer, params: Params) {
        self.layers[layer.index()] = params;
    }

    /// Overlays `params` onto an existing layer.
    pub fn extend(&mut self, layer: Layer, params: &Params) {
        self.layers[layer.index()].merge(params);
    }

    /// Looks `key` up from the highest layer down.
    pub fn get(&self, key: &str) -> Option<&Value> {
        Layer::ALL
            .iter()
            .rev()
            .find_map(|layer| self.layer(*layer).get(key))
    }

    /// The highest layer that defines `key`.
    pub fn origin(&self, key: &str) -> Option<Layer> {
        Layer::ALL
            .iter()
            .rev()
            .copied()
            .find(|layer| self.layer(*layer).contains(key))
    }

    /// The effective parameter map.
    pub fn merged(&self) -> Params {
        Params::layered(self.layers.iter())
    }
}
