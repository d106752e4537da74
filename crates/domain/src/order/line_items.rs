//! Services and components: the line items of a repair order.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Position-based identifier of a service within its order (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(u32);

impl ServiceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position-based identifier of a component within its service (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A part used by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,

    pub name: String,

    /// Estimated price of a single unit.
    pub unit_cost: Money,

    pub quantity: u32,

    /// Actual cost of the part, once work has started.
    pub real_cost: Option<Money>,
}

impl Component {
    /// Returns the estimated cost (unit cost × quantity), or None on overflow.
    pub fn estimated_cost(&self) -> Option<Money> {
        self.unit_cost.checked_times(self.quantity)
    }

    /// Returns the recorded real cost, or zero if none was recorded.
    pub fn real_cost(&self) -> Money {
        self.real_cost.unwrap_or_default()
    }
}

/// A unit of work on the vehicle, owned by exactly one repair order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,

    pub description: String,

    /// Estimated labor, on top of the components.
    pub labor_estimated_cost: Money,

    pub components: Vec<Component>,

    /// Service-level real cost (labor), once work has started.
    pub real_cost: Option<Money>,

    /// Whether the shop reported the service as finished.
    pub completed: bool,

    /// Labor plus every component's estimate, fixed when the service is added.
    pub estimated_cost: Money,

    /// Service-level real cost plus every component's real cost.
    #[serde(default)]
    pub real_total: Money,
}

impl Service {
    /// Sums labor and every component's estimate. None if the sum overflows.
    pub fn checked_estimate(&self) -> Option<Money> {
        let components = self
            .components
            .iter()
            .map(Component::estimated_cost)
            .collect::<Option<Vec<_>>>()?;
        Money::checked_sum(components)?.checked_add(self.labor_estimated_cost)
    }

    /// Sums the service-level real cost and every component's real cost.
    /// None if the sum overflows.
    pub fn checked_real_total(&self) -> Option<Money> {
        Money::checked_sum(self.components.iter().map(Component::real_cost))?
            .checked_add(self.real_cost.unwrap_or_default())
    }

    /// Returns a component by id.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }
}

/// A component as requested by the caller, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    #[serde(alias = "description")]
    pub name: String,

    #[serde(alias = "estimated_cost")]
    pub unit_cost: Money,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl NewComponent {
    pub fn new(name: impl Into<String>, unit_cost: Money, quantity: u32) -> Self {
        Self {
            name: name.into(),
            unit_cost,
            quantity,
        }
    }
}

/// A service as requested by the caller, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub description: String,

    #[serde(default)]
    pub labor_estimated_cost: Money,

    #[serde(default)]
    pub components: Vec<NewComponent>,
}

impl NewService {
    pub fn new(description: impl Into<String>, labor_estimated_cost: Money) -> Self {
        Self {
            description: description.into(),
            labor_estimated_cost,
            components: Vec::new(),
        }
    }

    /// Adds a component to the request.
    pub fn with_component(mut self, component: NewComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Assigns ids and builds the owned service.
    ///
    /// Returns None if the estimate is not representable.
    pub(crate) fn into_service(self, id: ServiceId) -> Option<Service> {
        let components = self
            .components
            .into_iter()
            .zip(1..)
            .map(|(c, n)| Component {
                id: ComponentId::new(n),
                name: c.name,
                unit_cost: c.unit_cost,
                quantity: c.quantity,
                real_cost: None,
            })
            .collect();

        let mut service = Service {
            id,
            description: self.description,
            labor_estimated_cost: self.labor_estimated_cost,
            components,
            real_cost: None,
            completed: false,
            estimated_cost: Money::zero(),
            real_total: Money::zero(),
        };
        service.estimated_cost = service.checked_estimate()?;
        Some(service)
    }
}
