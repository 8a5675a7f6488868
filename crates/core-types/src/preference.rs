/// Viewer preferences as handed over by the render gate at page display time.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(default))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PreferenceState {
    pub is_registered: bool,
    pub is_age_attested: bool,
    pub unblur_opt_in: bool,
}

impl PreferenceState {
    pub fn anonymous() -> Self {
        Self::default()
    }
}
