use mirrorfloor_common::BlurConfig;
use std::fmt;

/// Pass variants in their mandatory execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKind {
    BeforeHook,
    Reflection,
    Depth,
    Blur,
    Save,
    AfterHook,
}

impl PassKind {
    pub const ORDER: [PassKind; 6] = [
        PassKind::BeforeHook,
        PassKind::Reflection,
        PassKind::Depth,
        PassKind::Blur,
        PassKind::Save,
        PassKind::AfterHook,
    ];

    /// Hooks are caller code; every other pass records GPU work.
    pub fn is_hook(self) -> bool {
        matches!(self, PassKind::BeforeHook | PassKind::AfterHook)
    }

    pub fn name(self) -> &'static str {
        match self {
            PassKind::BeforeHook => "before-hook",
            PassKind::Reflection => "reflection",
            PassKind::Depth => "depth",
            PassKind::Blur => "blur",
            PassKind::Save => "save",
            PassKind::AfterHook => "after-hook",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Separable blur applied to the reflection before it is saved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurSettings {
    /// Tap spacing in texels.
    pub radius: f32,
    pub iterations: u32,
}

impl BlurSettings {
    pub fn is_noop(&self) -> bool {
        self.radius <= 0.0 || self.iterations == 0
    }
}

impl Default for BlurSettings {
    fn default() -> Self {
        BlurConfig::default().into()
    }
}

impl From<BlurConfig> for BlurSettings {
    fn from(config: BlurConfig) -> Self {
        Self {
            radius: config.radius,
            iterations: config.iterations,
        }
    }
}

/// Caller side effect run at the start or end of the reflection passes.
pub type Hook<S> = Box<dyn FnMut(&mut S)>;

/// One entry of a [`PassPipeline`](crate::PassPipeline).
pub enum Pass<S> {
    BeforeHook(Hook<S>),
    Reflection,
    Depth,
    Blur(BlurSettings),
    Save,
    AfterHook(Hook<S>),
}

impl<S> Pass<S> {
    pub fn before(hook: impl FnMut(&mut S) + 'static) -> Self {
        Pass::BeforeHook(Box::new(hook))
    }

    pub fn after(hook: impl FnMut(&mut S) + 'static) -> Self {
        Pass::AfterHook(Box::new(hook))
    }

    pub fn kind(&self) -> PassKind {
        match self {
            Pass::BeforeHook(_) => PassKind::BeforeHook,
            Pass::Reflection => PassKind::Reflection,
            Pass::Depth => PassKind::Depth,
            Pass::Blur(_) => PassKind::Blur,
            Pass::Save => PassKind::Save,
            Pass::AfterHook(_) => PassKind::AfterHook,
        }
    }
}

impl<S> fmt::Debug for Pass<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Blur(settings) => f.debug_tuple("Blur").field(settings).finish(),
            other => f.write_str(other.kind().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_sort_into_execution_order() {
        let mut kinds = vec![
            PassKind::Save,
            PassKind::AfterHook,
            PassKind::Reflection,
            PassKind::Blur,
            PassKind::BeforeHook,
            PassKind::Depth,
        ];
        kinds.sort();
        assert_eq!(kinds, PassKind::ORDER);
    }

    #[test]
    fn pass_reports_its_kind() {
        let pass: Pass<()> = Pass::before(|_| {});
        assert_eq!(pass.kind(), PassKind::BeforeHook);
        assert!(pass.kind().is_hook());
        assert_eq!(Pass::<()>::Blur(BlurSettings::default()).kind(), PassKind::Blur);
        assert!(!PassKind::Save.is_hook());
    }

    #[test]
    fn zero_radius_blur_is_noop() {
        let blur = BlurSettings {
            radius: 0.0,
            iterations: 3,
        };
        assert!(blur.is_noop());
        assert!(!BlurSettings::default().is_noop());
    }
}
