use plume_core::ServiceMethod;

/// The set of standard methods a service implements.
///
/// Declared once by the service and checked once at registration time; the
/// pipeline never probes a service for method presence at call time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ServiceCapabilities {
    bits: u8,
}

impl ServiceCapabilities {
    /// No methods.
    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    /// Every standard method.
    pub fn all() -> Self {
        Self::of(&ServiceMethod::ALL)
    }

    /// Only `find` and `get`.
    pub fn read_only() -> Self {
        Self::of(&[ServiceMethod::Find, ServiceMethod::Get])
    }

    pub fn of(methods: &[ServiceMethod]) -> Self {
        methods.iter().fold(Self::none(), |caps, m| caps.with(*m))
    }

    #[must_use]
    pub fn with(mut self, method: ServiceMethod) -> Self {
        self.insert(method);
        self
    }

    pub fn insert(&mut self, method: ServiceMethod) {
        self.bits |= Self::bit(method);
    }

    pub fn contains(&self, method: ServiceMethod) -> bool {
        self.bits & Self::bit(method) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Supported methods in their canonical order.
    pub fn iter(&self) -> impl Iterator<Item = ServiceMethod> + '_ {
        ServiceMethod::ALL
            .into_iter()
            .filter(move |method| self.contains(*method))
    }

    fn bit(method: ServiceMethod) -> u8 {
        let index = ServiceMethod::ALL
            .iter()
            .position(|m| *m == method)
            .unwrap_or_default();
        1 << index
    }
}

impl FromIterator<ServiceMethod> for ServiceCapabilities {
    fn from_iter<I: IntoIterator<Item = ServiceMethod>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), |caps, m| caps.with(m))
    }
}
