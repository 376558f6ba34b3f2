//! End-to-end runs from configuration files.

use approx::assert_relative_eq;
use boxchem::demos::{self, DEMOS};
use boxchem::input::parse_csv;
use boxchem::io::OutputTable;
use boxchem::{Configuration, CsvOutput};
use serde_json::json;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::path::Path;
use std::process::Command;

const MECHANISM: &str = r#"{
    "name": "chapman-like",
    "species": [
        { "name": "M", "constant": true },
        { "name": "O2" },
        { "name": "O" },
        { "name": "O3" }
    ],
    "reactions": [
        { "type": "PHOTOLYSIS", "name": "O3_1", "reactants": { "O3": {} }, "products": { "O": {}, "O2": {} } },
        { "type": "FIRST_ORDER_LOSS", "name": "O", "species": "O" }
    ]
}"#;

fn write_run(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("mechanism.json"), MECHANISM).unwrap();
    fs::write(
        dir.join("evolving.csv"),
        "time.min,ENV.temperature.K,PHOTO.O3_1.s-1\n0,280,0.001\n5,290,0.002\n",
    )
    .unwrap();
    let config = json!({
        "box model options": {
            "grid": "box",
            "chemistry time step [min]": 1,
            "output time step [min]": 5,
            "simulation length [min]": 10
        },
        "model components": [
            { "type": "gas phase chemistry", "mechanism": "mechanism.json" },
            { "type": "first-order loss", "species": ["O2"] }
        ],
        "initial conditions": {
            "ENV.pressure.Pa": 100000.0,
            "CONC.O3.mol m-3": 1.0e-6,
            "FIRST.unused.s-1": 1.0
        },
        "evolving conditions": { "evolving.csv": {} }
    });
    let path = dir.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn column(headers: &[String], name: &str) -> usize {
    headers.iter().position(|h| h == name).unwrap()
}

#[test]
fn test_run_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = Configuration::from_file(&write_run(dir.path())).unwrap();
    let output_path = dir.path().join("output.csv");

    let mut driver = config
        .build_driver(Box::new(CsvOutput::new(Some(output_path.clone()))))
        .unwrap();
    driver.run().unwrap();

    let csv = parse_csv("output.csv", &fs::read_to_string(output_path).unwrap()).unwrap();
    let times: Vec<f64> = csv.rows.iter().map(|r| r[0]).collect();
    assert_eq!(times, vec![0.0, 300.0, 600.0]);

    let temperature = column(&csv.headers, "ENV.temperature.K");
    assert_eq!(csv.rows[0][temperature], 280.0);
    assert_eq!(csv.rows[2][temperature], 290.0);
    assert_eq!(csv.rows[0][column(&csv.headers, "ENV.pressure.Pa")], 100000.0);

    // 0.001 s-1 for 300 s then 0.002 s-1 for 300 s
    let o3 = column(&csv.headers, "CONC.O3.mol m-3");
    assert_eq!(csv.rows[0][o3], 1.0e-6);
    assert_relative_eq!(csv.rows[1][o3], 1.0e-6 * (-0.3f64).exp(), max_relative = 1e-5);
    assert_relative_eq!(csv.rows[2][o3], 1.0e-6 * (-0.9f64).exp(), max_relative = 1e-5);
}

#[test]
fn test_cli_writes_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_run(dir.path());

    let result = Command::new(env!("CARGO_BIN_EXE_boxchem"))
        .arg(&config)
        .output()
        .unwrap();
    assert!(result.status.success());

    let stdout = String::from_utf8(result.stdout).unwrap();
    let csv = parse_csv("stdout", &stdout).unwrap();
    assert_eq!(csv.headers[0], "time.s");
    assert_eq!(csv.rows.len(), 3);
}

#[test]
fn test_cli_preprocess() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_run(dir.path());
    let export = dir.path().join("export");

    let result = Command::new(env!("CARGO_BIN_EXE_boxchem"))
        .arg(&config)
        .arg("--preprocess")
        .arg(&export)
        .output()
        .unwrap();
    assert!(result.status.success());
    assert!(result.stdout.is_empty());

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(export.join("config.json")).unwrap()).unwrap();
    assert_eq!(exported["box model options"]["chemistry time step"]["value"], 60.0);
    assert_eq!(exported["model components"][1]["type"], "first-order loss");
    assert!(export.join("mechanism.json").exists());

    // The exported configuration runs on its own
    let rerun = Configuration::from_file(&export.join("config.json")).unwrap();
    assert_eq!(rerun.components.len(), 2);
    assert!(rerun.build_driver(Box::new(CsvOutput::new(None))).is_ok());
}

#[test]
fn test_cli_missing_config() {
    let result = Command::new(env!("CARGO_BIN_EXE_boxchem")).output().unwrap();
    assert_eq!(result.status.code(), Some(3));
}

#[test]
fn test_cli_reports_error_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        json!({ "box model options": { "grid": "box" } }).to_string(),
    )
    .unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_boxchem"))
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.contains("ConfigurationError: "), "{stderr}");
}

mod bundled_examples {
    use super::*;

    fn run(name: &str) -> Rc<RefCell<OutputTable>> {
        let dir = tempfile::tempdir().unwrap();
        let path = demos::find(name).unwrap().write_to(dir.path()).unwrap();
        let config = Configuration::from_file(&path).unwrap();
        let table = Rc::new(RefCell::new(OutputTable::new()));

        let mut driver = config.build_driver(Box::new(Rc::clone(&table))).unwrap();
        driver.run().unwrap();
        assert!(driver.finished());
        let last = *driver.output_times().last().unwrap();
        assert_relative_eq!(last, config.options.simulation_length_s);
        table
    }

    #[test]
    fn test_every_example_runs() {
        for demo in DEMOS {
            let table = run(demo.name);
            let table = table.borrow();
            assert!(table.is_closed(), "{}", demo.name);
            for header in table.headers().iter().skip(1) {
                let values = table.column(header).unwrap();
                assert!(
                    values.iter().all(|v| v.is_finite() && *v >= 0.0),
                    "{}: {header}",
                    demo.name
                );
            }
        }
    }

    #[test]
    fn test_analytical_matches_closed_form() {
        let (k1, k2, a0) = (2.0e-3, 5.0e-4, 1.0e-6);
        let table = run("analytical");
        let table = table.borrow();
        let a = table.column("CONC.A.mol m-3").unwrap();
        let b = table.column("CONC.B.mol m-3").unwrap();
        let c = table.column("CONC.C.mol m-3").unwrap();

        for (i, t) in table.times().into_iter().enumerate() {
            let expected_a = a0 * (-k1 * t).exp();
            let expected_b = a0 * k1 / (k2 - k1) * ((-k1 * t).exp() - (-k2 * t).exp());
            assert_relative_eq!(a[i], expected_a, max_relative = 1e-4);
            assert_relative_eq!(b[i], expected_b, max_relative = 1e-4, epsilon = 1e-15);
            assert_relative_eq!(a[i] + b[i] + c[i], a0, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_chapman_ozone_after_sunset() {
        let table = run("chapman");
        let table = table.borrow();
        let times = table.times();
        let o = table.column("CONC.O.mol m-3").unwrap();
        let temperature = table.column("ENV.temperature.K").unwrap();

        // Photolysis and temperature follow the evolving conditions file
        let sunset = times.iter().position(|t| *t == 3600.0).unwrap();
        assert_eq!(temperature[0], 270.0);
        assert_eq!(temperature[sunset], 265.0);
        assert!(o[sunset - 1] > 0.0);
        assert!(o[times.len() - 1] < o[sunset - 1]);
    }

    #[test]
    fn test_flow_tube_particles() {
        let table = run("flow_tube");
        let table = table.borrow();
        let apinene = table.column("CONC.APINENE.mol m-3").unwrap();
        let number = table.column("AERO.number_concentration.m-3").unwrap();

        assert!(apinene[apinene.len() - 1] < apinene[0]);
        assert!(number[number.len() - 1] < number[0]);
    }

    #[test]
    fn test_cli_runs_example() {
        let result = Command::new(env!("CARGO_BIN_EXE_boxchem"))
            .args(["--example", "analytical"])
            .output()
            .unwrap();
        assert!(result.status.success());

        let stdout = String::from_utf8(result.stdout).unwrap();
        let csv = parse_csv("stdout", &stdout).unwrap();
        assert_eq!(csv.rows.len(), 13);
    }

    #[test]
    fn test_cli_rejects_unknown_example() {
        let result = Command::new(env!("CARGO_BIN_EXE_boxchem"))
            .args(["--example", "carbon_bond_5"])
            .output()
            .unwrap();
        assert!(!result.status.success());
    }
}
