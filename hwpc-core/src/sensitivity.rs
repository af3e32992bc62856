//! Monte-Carlo sensitivity analysis of uncertain parameters.
//!
//! Each uncertain quantity of the model (a [`VariabilitySource`]) may be wrapped by a
//! [`SensitivityParameter`]. When variability is enabled, querying the parameter returns a
//! multiplicative modifier
//!
//! $$ m = 1 + \varepsilon \cdot s $$
//!
//! where $\varepsilon$ is a standardised deviate drawn from the selected distribution and
//! $s$ is the scale derived from the configured multiplier. The multiplier always denotes
//! the half-width of a 95% interval, so for a Gaussian distribution $s$ is the multiplier
//! divided by 1.96 while for a uniform distribution on $[-1, 1]$ it is the multiplier itself.
//!
//! Deviates are cached in a [`DrawCache`] owned by the simulation run and keyed by
//! `(source, distribution, subject, realization)`. The draw itself is seeded from that key,
//! so workers computing different realizations never collide and repeated queries for the
//! same realization observe bit-identical values.

use crate::amounts::FloatValue;
use crate::errors::{HwpcError, HwpcResult};
use indexmap::IndexMap;
use log::warn;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Quantile of the standard normal distribution for a 95% two-sided interval
pub const GAUSSIAN_95_QUANTILE: FloatValue = 1.96;

/// Uncertain model inputs that can be perturbed
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariabilitySource {
    /// Basic wood density of a species
    BasicDensity,
    /// Carbon content of dry biomass
    CarbonContent,
    /// Service life of end-use products
    ProductLifetime,
    /// Half-life of degradable landfilled material
    LandfillHalfLife,
    /// Yield factor of transformation processors
    ProcessorYield,
}

/// Distribution of the standardised deviates
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistributionType {
    /// Uniform over [-1, 1]
    #[default]
    Uniform,
    /// Standard normal
    Gaussian,
}

impl DistributionType {
    /// Draw a standardised deviate
    pub fn draw_standard<R: Rng + ?Sized>(&self, rng: &mut R) -> FloatValue {
        match self {
            DistributionType::Uniform => rng.gen_range(-1.0..=1.0),
            DistributionType::Gaussian => rng.sample(StandardNormal),
        }
    }
}

impl FromStr for DistributionType {
    type Err = HwpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(DistributionType::Uniform),
            "gaussian" | "normal" => Ok(DistributionType::Gaussian),
            _ => Err(HwpcError::UnknownDistribution(s.to_string())),
        }
    }
}

impl TryFrom<String> for DistributionType {
    type Error = HwpcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DistributionType> for String {
    fn from(value: DistributionType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Scaled perturbation of a parameter
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Perturbation {
    Uniform { half_width: FloatValue },
    Gaussian { std_dev: FloatValue },
}

impl Perturbation {
    /// Build the perturbation whose 95% interval half-width is `multiplier`
    pub fn from_multiplier(distribution: DistributionType, multiplier: FloatValue) -> Self {
        match distribution {
            DistributionType::Uniform => Perturbation::Uniform {
                half_width: multiplier,
            },
            DistributionType::Gaussian => Perturbation::Gaussian {
                std_dev: multiplier / GAUSSIAN_95_QUANTILE,
            },
        }
    }

    pub fn distribution(&self) -> DistributionType {
        match self {
            Perturbation::Uniform { .. } => DistributionType::Uniform,
            Perturbation::Gaussian { .. } => DistributionType::Gaussian,
        }
    }

    /// Scale a standardised deviate
    pub fn apply(&self, standard: FloatValue) -> FloatValue {
        match self {
            Perturbation::Uniform { half_width } => standard * half_width,
            Perturbation::Gaussian { std_dev } => standard * std_dev,
        }
    }

    /// Draw a scaled deviate
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> FloatValue {
        self.apply(self.distribution().draw_standard(rng))
    }
}

/// Something that takes part in a Monte-Carlo simulation
pub trait MonteCarloSubject {
    /// Identifier of the subject, e.g. a stand or a simulation
    fn subject_id(&self) -> &str;
    /// Index of the Monte-Carlo realization currently being computed
    fn realization_id(&self) -> usize;
}

/// A subject bound to one Monte-Carlo realization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Realization {
    pub subject_id: String,
    pub realization_id: usize,
}

impl Realization {
    pub fn new(subject_id: &str, realization_id: usize) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            realization_id,
        }
    }
}

impl MonteCarloSubject for Realization {
    fn subject_id(&self) -> &str {
        &self.subject_id
    }

    fn realization_id(&self) -> usize {
        self.realization_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DrawKey {
    source: VariabilitySource,
    distribution: DistributionType,
    subject: String,
    realization: usize,
}

impl DrawKey {
    /// Seed of the random stream of this key within a run seeded with `run_seed`
    ///
    /// FNV-1a over the key fields followed by a SplitMix64 finaliser. Unlike the standard
    /// library hashers, the result is fixed across toolchains and platforms.
    fn stream_seed(&self, run_seed: u64) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = FNV_OFFSET;
        let mut write = |bytes: &[u8]| {
            for byte in bytes {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        };
        write(&run_seed.to_le_bytes());
        write(&[self.source as u8, self.distribution as u8]);
        write(self.subject.as_bytes());
        // Separates the subject from the realization
        write(&[0xff]);
        write(&(self.realization as u64).to_le_bytes());

        let mut z = hash.wrapping_add(0x9e37_79b9_7f4a_7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// Cache of standardised deviates for a simulation run
#[derive(Debug, Clone, Default)]
pub struct DrawCache {
    seed: u64,
    draws: HashMap<DrawKey, FloatValue>,
}

impl DrawCache {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            draws: HashMap::new(),
        }
    }

    fn standard_deviate(&mut self, key: DrawKey) -> FloatValue {
        let seed = self.seed;
        *self.draws.entry(key).or_insert_with_key(|key| {
            let mut rng = ChaCha8Rng::seed_from_u64(key.stream_seed(seed));
            key.distribution.draw_standard(&mut rng)
        })
    }

    /// Number of cached deviates
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn clear(&mut self) {
        self.draws.clear()
    }
}

/// An uncertain scalar parameter wrapped with a distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityParameter {
    #[serde(default)]
    pub distribution: DistributionType,
    /// Half-width of the 95% interval of the modifier, as a fraction of the nominal value
    #[serde(default)]
    pub multiplier: FloatValue,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for SensitivityParameter {
    fn default() -> Self {
        Self {
            distribution: DistributionType::Uniform,
            multiplier: 0.0,
            enabled: false,
        }
    }
}

impl SensitivityParameter {
    pub fn new(distribution: DistributionType, multiplier: FloatValue) -> Self {
        Self {
            distribution,
            multiplier,
            enabled: true,
        }
    }

    pub fn is_parameters_variability_enabled(&self) -> bool {
        self.enabled && self.multiplier != 0.0
    }

    pub fn perturbation(&self) -> Perturbation {
        Perturbation::from_multiplier(self.distribution, self.multiplier)
    }

    /// Modifier of the nominal value for a subject
    ///
    /// `subject_id` narrows the draw to a sub-subject (e.g. a species); when omitted, the
    /// subject's own identifier is used. Returns exactly 1.0 without drawing when
    /// variability is disabled.
    pub fn value(
        &self,
        source: VariabilitySource,
        subject: &dyn MonteCarloSubject,
        subject_id: Option<&str>,
        cache: &mut DrawCache,
    ) -> FloatValue {
        if !self.is_parameters_variability_enabled() {
            return 1.0;
        }
        let key = DrawKey {
            source,
            distribution: self.distribution,
            subject: subject_id.unwrap_or(subject.subject_id()).to_string(),
            realization: subject.realization_id(),
        };
        self.perturbation().apply(cache.standard_deviate(key)) + 1.0
    }
}

/// Serialized form of one sensitivity parameter
///
/// The distribution is kept as written so that an unsupported name is reported as
/// [`HwpcError::UnknownDistribution`] when the settings are assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub source: VariabilitySource,
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default)]
    pub multiplier: FloatValue,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_distribution() -> String {
    DistributionType::default().into()
}

/// The sensitivity parameters of a simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SensitivityEntry>", into = "Vec<SensitivityEntry>")]
pub struct SensitivitySettings {
    parameters: IndexMap<VariabilitySource, SensitivityParameter>,
}

impl TryFrom<Vec<SensitivityEntry>> for SensitivitySettings {
    type Error = HwpcError;

    fn try_from(entries: Vec<SensitivityEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl From<SensitivitySettings> for Vec<SensitivityEntry> {
    fn from(settings: SensitivitySettings) -> Self {
        settings
            .parameters
            .into_iter()
            .map(|(source, p)| SensitivityEntry {
                source,
                distribution: p.distribution.into(),
                multiplier: p.multiplier,
                enabled: p.enabled,
            })
            .collect()
    }
}

impl SensitivitySettings {
    pub fn from_entries(entries: Vec<SensitivityEntry>) -> HwpcResult<Self> {
        let parameters = entries
            .into_iter()
            .map(|e| -> HwpcResult<_> {
                let parameter = SensitivityParameter {
                    distribution: e.distribution.parse()?,
                    multiplier: e.multiplier,
                    enabled: e.enabled,
                };
                Ok((e.source, parameter))
            })
            .collect::<HwpcResult<_>>()?;
        Ok(Self { parameters })
    }

    /// Settings with every source disabled
    pub fn deterministic() -> Self {
        Self::default()
    }

    pub fn with_parameter(
        mut self,
        source: VariabilitySource,
        parameter: SensitivityParameter,
    ) -> Self {
        self.parameters.insert(source, parameter);
        self
    }

    pub fn get(&self, source: VariabilitySource) -> Option<&SensitivityParameter> {
        self.parameters.get(&source)
    }

    /// Change the multiplier of a source, creating a Uniform parameter if needed
    pub fn set_multiplier(&mut self, source: VariabilitySource, multiplier: FloatValue) {
        self.parameters
            .entry(source)
            .or_insert_with(|| SensitivityParameter::new(DistributionType::Uniform, 0.0))
            .multiplier = multiplier;
    }

    pub fn set_enabled(&mut self, source: VariabilitySource, enabled: bool) {
        if let Some(parameter) = self.parameters.get_mut(&source) {
            parameter.enabled = enabled;
        }
    }

    /// True if any source would perturb its parameter
    pub fn is_stochastic(&self) -> bool {
        self.parameters
            .values()
            .any(|p| p.is_parameters_variability_enabled())
    }

    /// Modifier for a source, 1.0 for sources without a parameter
    pub fn modifier(
        &self,
        source: VariabilitySource,
        subject: &dyn MonteCarloSubject,
        subject_id: Option<&str>,
        cache: &mut DrawCache,
    ) -> FloatValue {
        self.parameters
            .get(&source)
            .map(|p| p.value(source, subject, subject_id, cache))
            .unwrap_or(1.0)
    }
}

/// Everything needed to perturb parameters for one realization
pub struct SensitivityContext<'a> {
    settings: &'a SensitivitySettings,
    cache: &'a mut DrawCache,
    subject: &'a dyn MonteCarloSubject,
}

impl<'a> SensitivityContext<'a> {
    pub fn new(
        settings: &'a SensitivitySettings,
        cache: &'a mut DrawCache,
        subject: &'a dyn MonteCarloSubject,
    ) -> Self {
        Self {
            settings,
            cache,
            subject,
        }
    }

    /// Modifier for a source, clamped at zero
    ///
    /// Wide Gaussian perturbations may draw modifiers below zero which would turn a
    /// physical quantity negative.
    pub fn modifier(&mut self, source: VariabilitySource, subject_id: Option<&str>) -> FloatValue {
        let modifier = self
            .settings
            .modifier(source, self.subject, subject_id, &mut *self.cache);
        if modifier < 0.0 {
            warn!(
                "Clamping negative {:?} modifier {} to zero for realization {}",
                source,
                modifier,
                self.subject.realization_id()
            );
            return 0.0;
        }
        modifier
    }

    pub fn realization_id(&self) -> usize {
        self.subject.realization_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(multiplier: FloatValue) -> SensitivityParameter {
        SensitivityParameter::new(DistributionType::Gaussian, multiplier)
    }

    #[test]
    fn same_realization_gives_identical_draws() {
        let parameter = gaussian(0.2);
        let subject = Realization::new("stand-1", 7);
        let mut cache = DrawCache::new(42);

        let a = parameter.value(VariabilitySource::BasicDensity, &subject, None, &mut cache);
        let b = parameter.value(VariabilitySource::BasicDensity, &subject, None, &mut cache);
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(cache.len(), 1);

        // A separate cache for the same realization (e.g. another worker) agrees
        let mut other_cache = DrawCache::new(42);
        let c = parameter.value(
            VariabilitySource::BasicDensity,
            &subject,
            None,
            &mut other_cache,
        );
        assert_eq!(a.to_bits(), c.to_bits());
    }

    #[test]
    fn stream_seeds_are_stable() {
        let key = |realization| DrawKey {
            source: VariabilitySource::BasicDensity,
            distribution: DistributionType::Gaussian,
            subject: "stand-1".to_string(),
            realization,
        };
        assert_eq!(key(7).stream_seed(42), 542449193130003812);
        assert_eq!(key(8).stream_seed(42), 3048619158574052167);
        assert_ne!(key(7).stream_seed(42), key(7).stream_seed(43));
    }

    #[test]
    fn different_realizations_differ() {
        let parameter = gaussian(0.2);
        let mut cache = DrawCache::new(42);
        let a = parameter.value(
            VariabilitySource::BasicDensity,
            &Realization::new("stand-1", 0),
            None,
            &mut cache,
        );
        let b = parameter.value(
            VariabilitySource::BasicDensity,
            &Realization::new("stand-1", 1),
            None,
            &mut cache,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn subject_id_narrows_the_draw() {
        let parameter = gaussian(0.2);
        let subject = Realization::new("stand-1", 3);
        let mut cache = DrawCache::new(1);
        let spruce = parameter.value(
            VariabilitySource::BasicDensity,
            &subject,
            Some("spruce"),
            &mut cache,
        );
        let fir = parameter.value(
            VariabilitySource::BasicDensity,
            &subject,
            Some("fir"),
            &mut cache,
        );
        assert_ne!(spruce, fir);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn disabled_variability_returns_nominal() {
        let mut parameter = gaussian(0.5);
        parameter.enabled = false;
        let mut cache = DrawCache::new(0);
        for realization in 0..10 {
            let value = parameter.value(
                VariabilitySource::ProductLifetime,
                &Realization::new("s", realization),
                None,
                &mut cache,
            );
            assert_eq!(value, 1.0);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn multiplier_edits_apply_to_cached_draws() {
        let mut parameter = SensitivityParameter::new(DistributionType::Uniform, 0.1);
        let subject = Realization::new("s", 0);
        let mut cache = DrawCache::new(9);
        let first = parameter.value(VariabilitySource::CarbonContent, &subject, None, &mut cache);
        parameter.multiplier = 0.2;
        let second = parameter.value(VariabilitySource::CarbonContent, &subject, None, &mut cache);
        approx::assert_relative_eq!(second - 1.0, 2.0 * (first - 1.0), epsilon = 1e-12);
    }

    #[test]
    fn uniform_draws_stay_within_bounds() {
        let parameter = SensitivityParameter::new(DistributionType::Uniform, 0.3);
        let mut cache = DrawCache::new(5);
        for realization in 0..1000 {
            let value = parameter.value(
                VariabilitySource::ProcessorYield,
                &Realization::new("s", realization),
                None,
                &mut cache,
            );
            assert!((0.7..=1.3).contains(&value), "value {} out of range", value);
        }
    }

    #[test]
    fn gaussian_half_width_matches_multiplier() {
        let multiplier = 0.2;
        let parameter = gaussian(multiplier);
        let mut cache = DrawCache::new(2024);
        let n = 50_000;
        let mut deviates: Vec<FloatValue> = (0..n)
            .map(|realization| {
                parameter.value(
                    VariabilitySource::LandfillHalfLife,
                    &Realization::new("s", realization),
                    None,
                    &mut cache,
                ) - 1.0
            })
            .collect();

        let mean = deviates.iter().sum::<FloatValue>() / n as FloatValue;
        assert!(mean.abs() < 0.005, "mean deviate {}", mean);

        deviates.iter_mut().for_each(|d| *d = d.abs());
        deviates.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let half_width = deviates[(0.95 * n as FloatValue) as usize];
        assert!(
            (half_width - multiplier).abs() < 0.01,
            "empirical 95% half-width {}",
            half_width
        );
    }

    #[test]
    fn perturbation_draws_are_reproducible() {
        let perturbation = Perturbation::from_multiplier(DistributionType::Gaussian, 0.196);
        match perturbation {
            Perturbation::Gaussian { std_dev } => {
                approx::assert_relative_eq!(std_dev, 0.1, epsilon = 1e-12)
            }
            _ => panic!("expected a Gaussian perturbation"),
        }

        let mut rng1 = ChaCha8Rng::seed_from_u64(123);
        let mut rng2 = ChaCha8Rng::seed_from_u64(123);
        assert_eq!(perturbation.draw(&mut rng1), perturbation.draw(&mut rng2));
    }

    #[test]
    fn unknown_distribution_is_rejected() {
        assert!(matches!(
            "Triangular".parse::<DistributionType>(),
            Err(HwpcError::UnknownDistribution(_))
        ));

        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            sensitivity: SensitivitySettings,
        }

        let result = toml::from_str::<Wrapper>(
            r#"
            [[sensitivity]]
            source = "BasicDensity"
            distribution = "Beta"
            multiplier = 0.1
            "#,
        );
        assert!(result.is_err());

        let entry = SensitivityEntry {
            source: VariabilitySource::BasicDensity,
            distribution: "Beta".to_string(),
            multiplier: 0.1,
            enabled: true,
        };
        match SensitivitySettings::from_entries(vec![entry]) {
            Err(HwpcError::UnknownDistribution(name)) => assert_eq!(name, "Beta"),
            other => panic!("unexpected {:?}", other),
        }

        let parsed = toml::from_str::<Wrapper>(
            r#"
            [[sensitivity]]
            source = "BasicDensity"
            distribution = "Gaussian"
            multiplier = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed
                .sensitivity
                .get(VariabilitySource::BasicDensity)
                .map(|p| p.distribution),
            Some(DistributionType::Gaussian)
        );
    }

    #[test]
    fn settings_modifier() {
        let settings = SensitivitySettings::deterministic()
            .with_parameter(VariabilitySource::BasicDensity, gaussian(0.1));
        assert!(settings.is_stochastic());

        let subject = Realization::new("s", 4);
        let mut cache = DrawCache::new(0);
        let mut ctx = SensitivityContext::new(&settings, &mut cache, &subject);
        assert_eq!(ctx.modifier(VariabilitySource::CarbonContent, None), 1.0);
        assert_ne!(ctx.modifier(VariabilitySource::BasicDensity, None), 1.0);
    }

    #[test]
    fn negative_modifiers_are_clamped() {
        let settings = SensitivitySettings::deterministic()
            .with_parameter(VariabilitySource::ProductLifetime, gaussian(50.0));
        let mut cache = DrawCache::new(3);
        let mut clamped = 0;
        for realization in 0..200 {
            let subject = Realization::new("s", realization);
            let mut ctx = SensitivityContext::new(&settings, &mut cache, &subject);
            let modifier = ctx.modifier(VariabilitySource::ProductLifetime, None);
            assert!(modifier >= 0.0);
            if modifier == 0.0 {
                clamped += 1;
            }
        }
        // Roughly half of the draws fall below -1 / 25.5
        assert!(clamped > 50, "{} clamped modifiers", clamped);
    }
}
