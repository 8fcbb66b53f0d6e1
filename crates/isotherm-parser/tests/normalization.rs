use std::fs::File;
use std::io::Write;

use isotherm_parser::{
    assemble, compose, parse_loading, parse_pressure, split, Branch, DataTable, Diagnostics,
    LoadingBasis, MaterialBasis, Metadata, PressureMode, PressureUnit, RawIsotherm,
};
use polars::prelude::{ParquetReader, SerReader};

fn raw(data: DataTable) -> RawIsotherm {
    let mut metadata = Metadata::new();
    metadata.insert("pressure_unit", "kPa");
    RawIsotherm {
        metadata,
        data,
        diagnostics: Diagnostics::new(),
    }
}

#[test]
fn split_is_idempotent_on_adsorption_branch() {
    let series: [&[f64]; 4] = [
        &[1.0, 3.0, 7.0, 4.0, 2.0],
        &[0.5, 0.5, 0.2],
        &[9.0, 1.0, 2.0, 3.0],
        &[1.0, 2.0, 3.0, 4.0],
    ];
    for pressure in series {
        let index = split(pressure, None);
        let adsorption = &pressure[..index];
        assert_eq!(split(adsorption, None), adsorption.len(), "{pressure:?}");
    }

    let tags = [
        Branch::Adsorption,
        Branch::Adsorption,
        Branch::Desorption,
        Branch::Desorption,
    ];
    let index = split(&[], Some(&tags));
    assert_eq!(split(&[], Some(&tags[..index])), index);
}

#[test]
fn branch_less_rows_split_after_maximum() {
    assert_eq!(split(&[1.0, 3.0, 7.0, 4.0, 2.0], None), 3);
}

#[test]
fn assembled_branches_partition_rows() {
    let pressure = vec![1.0, 3.0, 7.0, 4.0, 2.0];
    let loading = vec![0.1, 0.3, 0.7, 0.5, 0.25];
    let data = DataTable::new()
        .with_column("pressure", pressure.clone())
        .with_column("loading", loading.clone());
    let record = assemble(raw(data)).expect("assemble failed");

    for (column, original) in [("pressure", &pressure), ("amount", &loading)] {
        let ads = record.adsorption.column(column).expect("adsorption column");
        let des = record.desorption.column(column).expect("desorption column");
        assert_eq!(ads.len() + des.len(), original.len());
        let joined: Vec<f64> = ads.iter().chain(des).copied().collect();
        assert_eq!(&joined, original);
    }
}

#[test]
fn raw_unit_strings_round_trip() {
    for raw_unit in ["Pe/kPa", "mmHg (abs)", "relative"] {
        let mut metadata = Metadata::new();
        metadata.insert("pressure_mode", "absolute");
        metadata.insert("pressure_unit", "kPa");
        metadata.insert("original_pressure_string", raw_unit);
        metadata.insert("original_loading_string", "cm³(STP)/g");
        let ads = DataTable::new()
            .with_column("pressure", vec![1.0])
            .with_column("loading", vec![2.0]);
        let record = compose(metadata, ads, DataTable::new()).expect("compose failed");
        assert_eq!(record.metadata.get_str("pressure_unit"), Some(raw_unit));
        assert_eq!(record.metadata.get_str("loading_unit"), Some("cm³(STP)/g"));
    }
}

#[test]
fn header_unit_scenarios() {
    let (_, pressure_unit) = "Pe/kPa".split_once('/').expect("header has a unit");
    let pressure = parse_pressure(pressure_unit).expect("pressure unit");
    assert_eq!(pressure.mode, PressureMode::Absolute);
    assert_eq!(pressure.unit, Some(PressureUnit::KPa));

    let (_, loading_unit) = "n/mmol/g".split_once('/').expect("header has a unit");
    let loading = parse_loading(loading_unit).expect("loading unit");
    assert_eq!(loading.loading_basis, LoadingBasis::Molar);
    assert_eq!(loading.loading_unit.as_deref(), Some("mmol"));
    assert_eq!(loading.material_basis, MaterialBasis::Mass);
    assert_eq!(loading.material_unit.as_deref(), Some("g"));

    let percent = parse_loading("0.5 wt%").expect("percent loading");
    assert_eq!(percent.loading_basis, LoadingBasis::Percent);
    assert_eq!(percent.material_basis, MaterialBasis::Mass);

    let volume = parse_loading("cm3/g").expect("volume loading must not fail");
    assert!(volume.ambiguity_warning().is_some());
}

#[test]
fn parquet_export_round_trips_through_disk() {
    let data = DataTable::new()
        .with_column("pressure", vec![1.0, 5.0, 9.0, 4.0])
        .with_column("pressure_saturation", vec![100.0; 4])
        .with_column("loading", vec![0.1, 0.5, 0.9, 0.6]);
    let record = assemble(raw(data)).expect("assemble failed");
    let (ads_bytes, des_bytes) = record.to_parquet().expect("parquet export failed");

    let dir = tempfile::tempdir().expect("tempdir");
    let ads_path = dir.path().join("ads.parquet");
    File::create(&ads_path)
        .and_then(|mut file| file.write_all(&ads_bytes))
        .expect("write parquet");

    let df = ParquetReader::new(File::open(&ads_path).expect("open parquet"))
        .finish()
        .expect("read parquet");
    assert_eq!(df.height(), 3);
    assert_eq!(df.get_column_names(), vec!["pressure", "p0", "amount"]);
    assert!(des_bytes.is_some_and(|bytes| !bytes.is_empty()));
}
