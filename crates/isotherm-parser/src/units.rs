//! Identification of pressure, loading and temperature units.
//!
//! Nothing here converts values between unit systems; unit strings are only
//! decomposed into the basis, symbol and mode they describe.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::diagnostics::ParseWarning;
use crate::errors::{UnitError, UnitRole};

pub const MOLAR_UNITS: &[&str] = &[
    "mmol", "mol", "kmol", "cm3(STP)", "mL(STP)", "cc(STP)", "L(STP)",
];
pub const MASS_UNITS: &[&str] = &["amu", "mg", "cg", "dg", "g", "kg"];
pub const VOLUME_UNITS: &[&str] = &["cm3", "mL", "cc", "dm3", "L", "m3"];

const FRACTION_ALIASES: &[(LoadingBasis, &[&str])] = &[
    (LoadingBasis::Percent, &["%", "percent"]),
    (LoadingBasis::Fraction, &["fractional", "fraction", "frac"]),
];

const BASIS_ALIASES: &[(MaterialBasis, &[&str])] = &[
    (MaterialBasis::Mass, &["mass", "wt", "weight"]),
    (MaterialBasis::Molar, &["molar", "mol"]),
    (MaterialBasis::Volume, &["volume", "vol"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PressureUnit {
    Torr,
    Pa,
    KPa,
    MPa,
    Bar,
    MBar,
    Atm,
}

impl PressureUnit {
    const ALIASES: &'static [(PressureUnit, &'static [&'static str])] = &[
        (PressureUnit::Torr, &["mmhg", "torr", "mm hg"]),
        (PressureUnit::Pa, &["pa", "pascal"]),
        (PressureUnit::KPa, &["kpa", "kilopascal"]),
        (PressureUnit::MPa, &["mpa", "megapascal"]),
        (PressureUnit::Bar, &["bar"]),
        (PressureUnit::MBar, &["mbar", "millibar"]),
        (PressureUnit::Atm, &["atm", "atmosphere"]),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            PressureUnit::Torr => "torr",
            PressureUnit::Pa => "Pa",
            PressureUnit::KPa => "kPa",
            PressureUnit::MPa => "MPa",
            PressureUnit::Bar => "bar",
            PressureUnit::MBar => "mbar",
            PressureUnit::Atm => "atm",
        }
    }

    fn from_clean(text: &str) -> Option<Self> {
        Self::ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&text))
            .map(|(unit, _)| *unit)
    }
}

impl fmt::Display for PressureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PressureMode {
    #[serde(rename = "absolute")]
    Absolute,
    #[serde(rename = "relative")]
    Relative,
    #[serde(rename = "relative%")]
    RelativePercent,
}

impl PressureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureMode::Absolute => "absolute",
            PressureMode::Relative => "relative",
            PressureMode::RelativePercent => "relative%",
        }
    }
}

/// Parsed pressure descriptor. `unit` is `None` exactly when the mode is relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PressureUnits {
    pub mode: PressureMode,
    pub unit: Option<PressureUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingBasis {
    Molar,
    Mass,
    /// Volume of gas at the isotherm temperature; the default reading of an
    /// ambiguous volume unit.
    VolumeGas,
    Fraction,
    Percent,
}

impl LoadingBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingBasis::Molar => "molar",
            LoadingBasis::Mass => "mass",
            LoadingBasis::VolumeGas => "volume_gas",
            LoadingBasis::Fraction => "fraction",
            LoadingBasis::Percent => "percent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialBasis {
    Mass,
    Molar,
    Volume,
}

impl MaterialBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialBasis::Mass => "mass",
            MaterialBasis::Molar => "molar",
            MaterialBasis::Volume => "volume",
        }
    }
}

/// Parsed loading descriptor: amount adsorbed per quantity of material.
///
/// Fractional and percentage loadings carry only the two bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadingUnits {
    pub loading_basis: LoadingBasis,
    pub loading_unit: Option<String>,
    pub material_basis: MaterialBasis,
    pub material_unit: Option<String>,
}

impl LoadingUnits {
    /// Warning to surface when the loading unit is a bare volume.
    pub fn ambiguity_warning(&self) -> Option<ParseWarning> {
        match (self.loading_basis, &self.loading_unit) {
            (LoadingBasis::VolumeGas, Some(unit)) => {
                Some(ParseWarning::AmbiguousVolumeUnit { unit: unit.clone() })
            }
            _ => None,
        }
    }
}

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"_,^]"#).expect("punctuation pattern is valid"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("space pattern is valid"));
static BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[{\[()\]}]").expect("bracket pattern is valid"));

/// Normalise a unit string before matching: punctuation and brackets go,
/// whitespace collapses, superscript digits become ASCII, case is lowered.
pub fn clean_unit_string(raw: &str) -> String {
    let text = PUNCTUATION.replace_all(raw, "");
    let text = SPACES.replace_all(&text, " ");
    let text = text.replace('²', "2").replace('³', "3");
    let text = BRACKETS.replace_all(&text, "");
    text.to_lowercase().trim().to_string()
}

pub fn parse_pressure(raw: &str) -> Result<PressureUnits, UnitError> {
    let clean = clean_unit_string(raw);

    match clean.as_str() {
        "relative" | "p/p0" | "p/po" => Ok(PressureUnits {
            mode: PressureMode::Relative,
            unit: None,
        }),
        "relative%" => Ok(PressureUnits {
            mode: PressureMode::RelativePercent,
            unit: None,
        }),
        other => match PressureUnit::from_clean(other) {
            Some(unit) => Ok(PressureUnits {
                mode: PressureMode::Absolute,
                unit: Some(unit),
            }),
            None => Err(UnitError::Parse {
                role: UnitRole::Pressure,
                raw: raw.to_string(),
            }),
        },
    }
}

pub fn parse_loading(raw: &str) -> Result<LoadingUnits, UnitError> {
    let parse_error = || UnitError::Parse {
        role: UnitRole::Loading,
        raw: raw.to_string(),
    };
    let mut clean = clean_unit_string(raw);

    // single descriptors such as "wt%" or "fraction volume"
    for (loading_basis, aliases) in FRACTION_ALIASES {
        if aliases.iter().any(|alias| clean.contains(alias)) {
            let material_basis = BASIS_ALIASES
                .iter()
                .find(|(_, aliases)| aliases.iter().any(|alias| clean.contains(alias)))
                .map(|(basis, _)| *basis)
                .ok_or_else(parse_error)?;
            return Ok(LoadingUnits {
                loading_basis: *loading_basis,
                loading_unit: None,
                material_basis,
                material_unit: None,
            });
        }
    }

    let stp = clean.contains("stp");
    if stp {
        clean = clean.replace("stp", "");
        clean = SPACES.replace_all(&clean, " ").trim().to_string();
    }

    let (loading_unit, material_unit) = split_ratio(&clean).ok_or_else(parse_error)?;
    let mut loading_unit = upper_litre(loading_unit);
    let material_unit = upper_litre(material_unit);
    if stp {
        loading_unit.push_str("(STP)");
    }

    let loading_basis = loading_basis_of(&loading_unit)?;
    let material_basis = material_basis_of(&material_unit)?;

    Ok(LoadingUnits {
        loading_basis,
        loading_unit: Some(loading_unit),
        material_basis,
        material_unit: Some(material_unit),
    })
}

/// Split "x/y" or the inverse-unit notation "x y-1" into its two tokens.
fn split_ratio(clean: &str) -> Option<(&str, &str)> {
    let slash: Vec<&str> = clean.split('/').map(str::trim).collect();
    let (loading, material) = match slash.as_slice() {
        [loading, material] => (*loading, *material),
        _ => {
            let spaced: Vec<&str> = clean.split_whitespace().collect();
            match spaced.as_slice() {
                [loading, material] => {
                    let material: &str = material;
                    (*loading, material.strip_suffix("-1").unwrap_or(material))
                }
                _ => return None,
            }
        }
    };
    (!loading.is_empty() && !material.is_empty()).then_some((loading, material))
}

fn upper_litre(unit: &str) -> String {
    match unit {
        "ml" => "mL".to_string(),
        "l" => "L".to_string(),
        other => other.to_string(),
    }
}

fn loading_basis_of(unit: &str) -> Result<LoadingBasis, UnitError> {
    if MOLAR_UNITS.contains(&unit) {
        return Ok(LoadingBasis::Molar);
    }
    if MASS_UNITS.contains(&unit) {
        return Ok(LoadingBasis::Mass);
    }
    if VOLUME_UNITS.contains(&unit) {
        debug!(unit, "volume loading unit read as gas at isotherm temperature");
        return Ok(LoadingBasis::VolumeGas);
    }
    Err(UnitError::Unrecognized {
        role: UnitRole::Loading,
        unit: unit.to_string(),
    })
}

fn material_basis_of(unit: &str) -> Result<MaterialBasis, UnitError> {
    if MASS_UNITS.contains(&unit) {
        return Ok(MaterialBasis::Mass);
    }
    if VOLUME_UNITS.contains(&unit) {
        return Ok(MaterialBasis::Volume);
    }
    if MOLAR_UNITS.contains(&unit) {
        return Ok(MaterialBasis::Molar);
    }
    Err(UnitError::Unrecognized {
        role: UnitRole::Material,
        unit: unit.to_string(),
    })
}

/// Map a temperature unit onto `°C` or `K`, returning it unchanged otherwise.
pub fn parse_temperature_unit(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains('c') {
        "°C".to_string()
    } else if lower.contains('k') {
        "K".to_string()
    } else {
        raw.to_string()
    }
}

/// Clean a free-text temperature unit and normalise it.
pub fn parse_temperature_string(raw: &str) -> String {
    parse_temperature_unit(&clean_unit_string(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_pipeline() {
        assert_eq!(clean_unit_string("  cm³(STP)/g "), "cm3stp/g");
        assert_eq!(clean_unit_string("'mmol  g^-1'"), "mmol g-1");
        assert_eq!(clean_unit_string("[kPa]"), "kpa");
        assert_eq!(clean_unit_string("P_/P0"), "p/p0");
    }

    #[test]
    fn pressure_aliases() {
        let cases = [
            ("P/Po", PressureMode::Relative, None),
            ("P/P0", PressureMode::Relative, None),
            ("relative", PressureMode::Relative, None),
            ("relative%", PressureMode::RelativePercent, None),
            ("mmHg", PressureMode::Absolute, Some(PressureUnit::Torr)),
            ("Torr", PressureMode::Absolute, Some(PressureUnit::Torr)),
            ("kPa", PressureMode::Absolute, Some(PressureUnit::KPa)),
            ("(kPa)", PressureMode::Absolute, Some(PressureUnit::KPa)),
            ("bar", PressureMode::Absolute, Some(PressureUnit::Bar)),
            ("mbar", PressureMode::Absolute, Some(PressureUnit::MBar)),
            ("MPa", PressureMode::Absolute, Some(PressureUnit::MPa)),
            ("Pa", PressureMode::Absolute, Some(PressureUnit::Pa)),
            ("atm", PressureMode::Absolute, Some(PressureUnit::Atm)),
        ];
        for (raw, mode, unit) in cases {
            let parsed = parse_pressure(raw).unwrap_or_else(|err| panic!("{raw}: {err}"));
            assert_eq!(parsed.mode, mode, "{raw}");
            assert_eq!(parsed.unit, unit, "{raw}");
        }
    }

    #[test]
    fn unknown_pressure_unit_fails() {
        match parse_pressure("psi") {
            Err(UnitError::Parse { role, raw }) => {
                assert_eq!(role, UnitRole::Pressure);
                assert_eq!(raw, "psi");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn loading_notations_agree() {
        assert_eq!(
            parse_loading("mmol/g").unwrap(),
            parse_loading("mmol g-1").unwrap()
        );
        assert_eq!(
            parse_loading("cm3/g").unwrap(),
            parse_loading("cm^3 g^-1").unwrap()
        );
        let parsed = parse_loading("mmol/g").unwrap();
        assert_eq!(parsed.loading_basis, LoadingBasis::Molar);
        assert_eq!(parsed.loading_unit.as_deref(), Some("mmol"));
        assert_eq!(parsed.material_basis, MaterialBasis::Mass);
        assert_eq!(parsed.material_unit.as_deref(), Some("g"));
    }

    #[test]
    fn stp_marker_makes_volume_molar() {
        for raw in ["cm³/g STP", "cm3(STP)/g", "cc STP/g", "ml(STP)/g"] {
            let parsed = parse_loading(raw).unwrap_or_else(|err| panic!("{raw}: {err}"));
            assert_eq!(parsed.loading_basis, LoadingBasis::Molar, "{raw}");
            assert!(parsed.ambiguity_warning().is_none(), "{raw}");
        }
        assert_eq!(
            parse_loading("ml(STP)/g").unwrap().loading_unit.as_deref(),
            Some("mL(STP)")
        );
    }

    #[test]
    fn fractional_descriptors() {
        let parsed = parse_loading("0.5 wt%").unwrap();
        assert_eq!(parsed.loading_basis, LoadingBasis::Percent);
        assert_eq!(parsed.material_basis, MaterialBasis::Mass);
        assert!(parsed.loading_unit.is_none());
        assert!(parsed.material_unit.is_none());

        let parsed = parse_loading("fractional volume").unwrap();
        assert_eq!(parsed.loading_basis, LoadingBasis::Fraction);
        assert_eq!(parsed.material_basis, MaterialBasis::Volume);

        assert!(parse_loading("percent").is_err());
    }

    #[test]
    fn volume_loading_is_ambiguous_but_accepted() {
        let parsed = parse_loading("cm3/g").unwrap();
        assert_eq!(parsed.loading_basis, LoadingBasis::VolumeGas);
        assert_eq!(
            parsed.ambiguity_warning(),
            Some(ParseWarning::AmbiguousVolumeUnit {
                unit: "cm3".to_string()
            })
        );
        let parsed = parse_loading("L/kg").unwrap();
        assert_eq!(parsed.loading_unit.as_deref(), Some("L"));
        assert_eq!(parsed.material_basis, MaterialBasis::Mass);
    }

    #[test]
    fn unrecognized_units_fail_hard() {
        assert_eq!(
            parse_loading("furlong/g"),
            Err(UnitError::Unrecognized {
                role: UnitRole::Loading,
                unit: "furlong".to_string()
            })
        );
        assert_eq!(
            parse_loading("mmol/bucket"),
            Err(UnitError::Unrecognized {
                role: UnitRole::Material,
                unit: "bucket".to_string()
            })
        );
        assert!(matches!(
            parse_loading("mmol"),
            Err(UnitError::Parse { .. })
        ));
        // Readers strip the "n/" column label before parsing, so a full
        // header cell reaching this function is malformed.
        assert!(matches!(
            parse_loading("n/mmol/g"),
            Err(UnitError::Parse { .. })
        ));
    }

    #[test]
    fn temperature_units() {
        assert_eq!(parse_temperature_unit("C"), "°C");
        assert_eq!(parse_temperature_unit("degC"), "°C");
        assert_eq!(parse_temperature_unit("K"), "K");
        assert_eq!(parse_temperature_unit("F"), "F");
        assert_eq!(parse_temperature_string("[K]"), "K");
    }
}
