use std::path::PathBuf;
use anyhow::Result;
use clap::{Args, ValueEnum};

use ff_energy::EnergyTables;
use ff_energy::loop_energy::{Dangles, LoopEnergyConfig};

const T_MEASURE: f64 = 37.0;
const K0: f64 = 273.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DanglesArg {
    #[value(name = "0")]
    D0,
    #[value(name = "1")]
    D1,
    #[value(name = "2")]
    D2,
    #[value(name = "3")]
    D3,
}

impl From<DanglesArg> for Dangles {
    fn from(d: DanglesArg) -> Self {
        match d {
            DanglesArg::D0 => Dangles::D0,
            DanglesArg::D1 => Dangles::D1,
            DanglesArg::D2 => Dangles::D2,
            DanglesArg::D3 => Dangles::D3,
        }
    }
}

/// Free energy evaluation parameters (spec.md §6 configuration options).
#[derive(Debug, Args)]
pub struct EnergyModelArguments {
    /// Temperature in Celsius
    #[arg(short, long, default_value = "37.0")]
    pub temperature: f64,

    /// Parameter file (e.g. rna_turner2004.par)
    #[arg(short, long, value_name = "FILE")]
    pub model_parameters: Option<PathBuf>,

    /// Dangling-end / mismatch model
    #[arg(short, long, value_enum, default_value = "2")]
    pub dangles: DanglesArg,

    /// Disallow GU/UG pairs altogether
    #[arg(long)]
    pub no_gu: bool,

    /// Disallow GU/UG pairs at the closing position of a loop
    #[arg(long)]
    pub no_closing_gu: bool,
}

impl EnergyModelArguments {
    /// Return the parameter file path, falling back to crate-relative default.
    pub fn param_file(&self) -> PathBuf {
        self.model_parameters.clone().unwrap_or_else(|| {
            PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/params/rna_turner2004.par"))
        })
    }

    /// Load the parameter table, either from `--model-parameters` or the
    /// bundled Turner 2004 set, rescaled to `--temperature`.
    pub fn load_tables(&self) -> Result<EnergyTables> {
        let mut tables = if self.model_parameters.is_some() {
            EnergyTables::from_parameter_file(self.param_file())?
        } else {
            EnergyTables::turner2004()
        };
        if self.temperature != T_MEASURE {
            let temp_change = (self.temperature + K0) / (T_MEASURE + K0);
            tables.rescale(temp_change);
        }
        Ok(tables)
    }

    pub fn loop_energy_config(&self) -> LoopEnergyConfig {
        LoopEnergyConfig {
            dangles: self.dangles.into(),
            no_gu: self.no_gu,
            no_closing_gu: self.no_closing_gu,
            salt_correction: 0.0,
        }
    }
}
