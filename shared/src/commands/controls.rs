use std::fmt;

use crate::osc::argument::OscArgument;
use crate::types::BusId;

/// A synth control setting: a literal value or a bus mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Float(f32),
    Int(i32),
    /// Read continuously from a control bus ("c12" on the wire)
    ControlBus(BusId),
    /// Read continuously from an audio bus ("a3" on the wire)
    AudioBus(BusId),
}

impl ControlValue {
    pub fn to_argument(&self) -> OscArgument {
        match self {
            ControlValue::Float(value) => OscArgument::Float(*value),
            ControlValue::Int(value) => OscArgument::Int(*value),
            ControlValue::ControlBus(bus_id) => OscArgument::String(format!("c{}", bus_id)),
            ControlValue::AudioBus(bus_id) => OscArgument::String(format!("a{}", bus_id)),
        }
    }

    pub fn from_argument(argument: &OscArgument) -> Option<Self> {
        match argument {
            OscArgument::Int(value) => Some(ControlValue::Int(*value)),
            OscArgument::Float(value) => Some(ControlValue::Float(*value)),
            OscArgument::Double(value) => Some(ControlValue::Float(*value as f32)),
            OscArgument::String(value) => {
                if let Some(index) = value.strip_prefix('c') {
                    index.parse::<BusId>().ok().map(ControlValue::ControlBus)
                } else if let Some(index) = value.strip_prefix('a') {
                    index.parse::<BusId>().ok().map(ControlValue::AudioBus)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ControlValue::Float(value) => Some(*value),
            ControlValue::Int(value) => Some(*value as f32),
            _ => None,
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Float(value) => write!(f, "{:?}", value),
            ControlValue::Int(value) => write!(f, "{}", value),
            ControlValue::ControlBus(bus_id) => write!(f, "c{}", bus_id),
            ControlValue::AudioBus(bus_id) => write!(f, "a{}", bus_id),
        }
    }
}

impl From<f32> for ControlValue {
    fn from(value: f32) -> Self {
        ControlValue::Float(value)
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        ControlValue::Int(value)
    }
}

/// Ordered control name to value pairs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Controls(Vec<(String, ControlValue)>);

impl Controls {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ControlValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Updates `name` in place, or appends it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ControlValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    /// Applies every pair of `other` in order.
    pub fn merge(&mut self, other: &Controls) {
        for (name, value) in other.iter() {
            self.set(name.clone(), *value);
        }
    }

    pub fn get(&self, name: &str) -> Option<ControlValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ControlValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens into alternating name / value arguments.
    pub fn to_arguments(&self) -> Vec<OscArgument> {
        let mut arguments = Vec::with_capacity(self.0.len() * 2);
        for (name, value) in &self.0 {
            arguments.push(OscArgument::String(name.clone()));
            arguments.push(value.to_argument());
        }
        arguments
    }
}

impl<S: Into<String>, V: Into<ControlValue>> FromIterator<(S, V)> for Controls {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut controls = Controls::new();
        for (name, value) in iter {
            controls.set(name, value);
        }
        controls
    }
}

impl fmt::Display for Controls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}
