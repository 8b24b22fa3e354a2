use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::{BCOUNT as B, PCOUNT as P};
use crate::NucleotideVec;

use super::parsing::{dispatch, ParamFileSection};

#[derive(Debug)]
pub enum ParamError {
    Io(String),
    Parse(String),
    MissingValue(&'static str, usize),
    InvalidLength(&'static str, usize, usize),
    InvalidHairpinSize(usize),
}

impl std::error::Error for ParamError {}

impl From<std::io::Error> for ParamError {
    fn from(e: std::io::Error) -> Self {
        ParamError::Io(e.to_string())
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Io(e) => write!(f, "I/O error: {}", e),
            ParamError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ParamError::MissingValue(table, index) => {
                write!(f, "Missing value in parameter table '{}' at index {}", table, index)
            }
            ParamError::InvalidLength(table, expected, got) => {
                write!(f, "Invalid length for parameter table '{}': expected {}, got {}", table, expected, got)
            }
            ParamError::InvalidHairpinSize(n) => write!(f, "Invalid hairpin size: {}", n),
        }
    }
}

fn rescale_energy(g_old: Option<i32>, h: Option<i32>, temp_change: f64) -> Option<i32> {
    match (g_old, h) {
        (Some(g), Some(h)) => {
            let gf = g as f64;
            let hf = h as f64;
            let s = hf - gf;
            Some((hf - temp_change * s).round() as i32)
        }
        _ => None,
    }
}

trait RescaleWith {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64);
}

impl RescaleWith for Option<i32> {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64) {
        *self = rescale_energy(*self, *enthalpies, temp_change);
    }
}

impl<T: RescaleWith, const N: usize> RescaleWith for [T; N] {
    fn rescale_with(&mut self, enthalpies: &Self, temp_change: f64) {
        for (g, h) in self.iter_mut().zip(enthalpies.iter()) {
            g.rescale_with(h, temp_change);
        }
    }
}

/// Turner-2004-shaped nearest-neighbor energy tables (hundredths of kcal/mol, 37C).
///
/// Indexed by `PairTypeRNA as usize` / `Base as usize`, matching the column order
/// documented in the ViennaRNA `.par` text format. `int22` drops the `N` row/column
/// of both bases and pair types (matching the published table, which never lists
/// N-containing 2x2 interior loop entries).
#[derive(Debug)]
pub struct EnergyTables {
    pub stack: [[Option<i32>; P]; P],
    pub stack_enthalpies: [[Option<i32>; P]; P],

    pub mismatch_hairpin: [[[Option<i32>; B]; B]; P],
    pub mismatch_hairpin_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_1n: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_1n_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_23: [[[Option<i32>; B]; B]; P],
    pub mismatch_interior_23_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_multi: [[[Option<i32>; B]; B]; P],
    pub mismatch_multi_enthalpies: [[[Option<i32>; B]; B]; P],
    pub mismatch_exterior: [[[Option<i32>; B]; B]; P],
    pub mismatch_exterior_enthalpies: [[[Option<i32>; B]; B]; P],

    pub dangle5: [[Option<i32>; B]; P],
    pub dangle5_enthalpies: [[Option<i32>; B]; P],
    pub dangle3: [[Option<i32>; B]; P],
    pub dangle3_enthalpies: [[Option<i32>; B]; P],

    pub int11: Box<[[[[Option<i32>; B]; B]; P]; P]>,
    pub int11_enthalpies: Box<[[[[Option<i32>; B]; B]; P]; P]>,
    pub int21: Box<[[[[[Option<i32>; B]; B]; B]; P]; P]>,
    pub int21_enthalpies: Box<[[[[[Option<i32>; B]; B]; B]; P]; P]>,
    pub int22: Box<[[[[[[Option<i32>; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]>,
    pub int22_enthalpies: Box<[[[[[[Option<i32>; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]>,

    pub hairpin: [Option<i32>; 31],
    pub hairpin_enthalpies: [Option<i32>; 31],
    pub bulge: [Option<i32>; 31],
    pub bulge_enthalpies: [Option<i32>; 31],
    pub interior: [Option<i32>; 31],
    pub interior_enthalpies: [Option<i32>; 31],

    /// [base, base_enthalpy, closing, closing_enthalpy, intern, intern_enthalpy]
    pub ml_params: [Option<i32>; 6],
    /// [en37, enthalpy, max_ninio]
    pub ninio: [Option<i32>; 3],
    /// [duplex_init_en37, duplex_init_enth, terminal_ru_en37, terminal_ru_enth, lxc_raw, unused]
    pub misc: [Option<i32>; 6],

    pub hairpin_sequences: FxHashMap<NucleotideVec, (i32, i32)>,
}

macro_rules! zero_2d { () => { [[None; P]; P] }; }
macro_rules! zero_3d { () => { [[[None; B]; B]; P] }; }
macro_rules! zero_2dpb { () => { [[None; B]; P] }; }

impl EnergyTables {
    pub fn empty() -> Self {
        EnergyTables {
            stack: zero_2d!(),
            stack_enthalpies: zero_2d!(),
            mismatch_hairpin: zero_3d!(),
            mismatch_hairpin_enthalpies: zero_3d!(),
            mismatch_interior: zero_3d!(),
            mismatch_interior_enthalpies: zero_3d!(),
            mismatch_interior_1n: zero_3d!(),
            mismatch_interior_1n_enthalpies: zero_3d!(),
            mismatch_interior_23: zero_3d!(),
            mismatch_interior_23_enthalpies: zero_3d!(),
            mismatch_multi: zero_3d!(),
            mismatch_multi_enthalpies: zero_3d!(),
            mismatch_exterior: zero_3d!(),
            mismatch_exterior_enthalpies: zero_3d!(),
            dangle5: zero_2dpb!(),
            dangle5_enthalpies: zero_2dpb!(),
            dangle3: zero_2dpb!(),
            dangle3_enthalpies: zero_2dpb!(),
            int11: Box::new([[[[None; B]; B]; P]; P]),
            int11_enthalpies: Box::new([[[[None; B]; B]; P]; P]),
            int21: Box::new([[[[[None; B]; B]; B]; P]; P]),
            int21_enthalpies: Box::new([[[[[None; B]; B]; B]; P]; P]),
            int22: Box::new([[[[[[None; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]),
            int22_enthalpies: Box::new([[[[[[None; B - 1]; B - 1]; B - 1]; B - 1]; P - 1]; P - 1]),
            hairpin: [None; 31],
            hairpin_enthalpies: [None; 31],
            bulge: [None; 31],
            bulge_enthalpies: [None; 31],
            interior: [None; 31],
            interior_enthalpies: [None; 31],
            ml_params: [None; 6],
            ninio: [None; 3],
            misc: [None; 6],
            hairpin_sequences: FxHashMap::default(),
        }
    }

    pub fn from_parameter_file<PT: AsRef<Path>>(path: PT) -> Result<Self, ParamError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_str_data(data: &str) -> Result<Self, ParamError> {
        Self::from_reader(std::io::Cursor::new(data))
    }

    fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParamError> {
        let mut tables = EnergyTables::empty();
        let mut section = ParamFileSection::None;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with("/*") {
                continue;
            }

            if let Some(rest) = line.strip_prefix("# ") {
                match ParamFileSection::try_from(rest.trim()) {
                    Ok(sec) => section = sec,
                    Err(_) => return Err(ParamError::Parse(rest.to_string())),
                }
                continue;
            } else if line.starts_with('#') {
                continue;
            }

            dispatch(&mut section, line, &mut tables)?;
        }
        Ok(tables)
    }

    pub fn rescale(&mut self, temp_change: f64) {
        self.stack.rescale_with(&self.stack_enthalpies, temp_change);
        self.mismatch_hairpin.rescale_with(&self.mismatch_hairpin_enthalpies, temp_change);
        self.mismatch_interior.rescale_with(&self.mismatch_interior_enthalpies, temp_change);
        self.mismatch_interior_1n.rescale_with(&self.mismatch_interior_1n_enthalpies, temp_change);
        self.mismatch_interior_23.rescale_with(&self.mismatch_interior_23_enthalpies, temp_change);
        self.mismatch_multi.rescale_with(&self.mismatch_multi_enthalpies, temp_change);
        self.mismatch_exterior.rescale_with(&self.mismatch_exterior_enthalpies, temp_change);
        self.dangle5.rescale_with(&self.dangle5_enthalpies, temp_change);
        self.dangle3.rescale_with(&self.dangle3_enthalpies, temp_change);
        (*self.int11).rescale_with(&*self.int11_enthalpies, temp_change);
        (*self.int21).rescale_with(&*self.int21_enthalpies, temp_change);
        (*self.int22).rescale_with(&*self.int22_enthalpies, temp_change);
        self.hairpin.rescale_with(&self.hairpin_enthalpies, temp_change);
        self.bulge.rescale_with(&self.bulge_enthalpies, temp_change);
        self.interior.rescale_with(&self.interior_enthalpies, temp_change);

        for (i, j) in [(0, 1), (2, 3), (4, 5)] {
            self.ml_params[i] = rescale_energy(self.ml_params[i], self.ml_params[j], temp_change);
        }
        self.ninio[0] = rescale_energy(self.ninio[0], self.ninio[1], temp_change);
        for (i, j) in [(0, 1), (2, 3)] {
            self.misc[i] = rescale_energy(self.misc[i], self.misc[j], temp_change);
        }
        if let Some(lxc) = self.misc[4] {
            self.misc[4] = Some((lxc as f64 * temp_change).round() as i32);
        }

        for (en37, enth) in self.hairpin_sequences.values_mut() {
            *en37 = rescale_energy(Some(*en37), Some(*enth), temp_change).unwrap();
        }
    }

    // -- named accessors, hundredths of kcal/mol unless noted --

    pub fn ml_base(&self) -> i32 { self.ml_params[0].unwrap_or(0) }
    pub fn ml_closing(&self) -> i32 { self.ml_params[2].unwrap_or(0) }
    pub fn ml_intern(&self) -> i32 { self.ml_params[4].unwrap_or(0) }
    pub fn ninio_m(&self) -> i32 { self.ninio[0].unwrap_or(0) }
    pub fn max_ninio(&self) -> i32 { self.ninio[2].unwrap_or(300) }
    pub fn terminal_au(&self) -> i32 { self.misc[2].unwrap_or(0) }
    /// `lxc37`: logarithmic loop-length extrapolation coefficient, kcal/mol.
    pub fn lxc37(&self) -> f64 { self.misc[4].unwrap_or(10786) as f64 / 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Base, PairTypeRNA};

    #[test]
    fn test_parse_stack() {
        let dummy = r#"
# stack
/*  CG    GC    GU    UG    AU    UA    NN          */
  -240  -330  -210  -140  -210  -210  -140    /* CG */
  -330  -340  -250  -150  -220  -240  -150    /* GC */
  -210  -250   130   -50  -140  -130   130    /* GU */
  -140  -150   -50    30   -60  -100    30    /* UG */
  -210  -220  -140   -60  -110   -90   -60    /* AU */
  -210  -240  -130  -100   -90  -130   -90    /* UA */
  -140  -150   130    30   -60   -90   130    /* NN */
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize], Some(-240));
        assert_eq!(tables.stack[PairTypeRNA::GC as usize][PairTypeRNA::CG as usize], Some(-330));
        assert_eq!(tables.stack[PairTypeRNA::GU as usize][PairTypeRNA::CG as usize], Some(-210));
    }

    #[test]
    fn test_parse_mismatch_hairpin() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# mismatch_hairpin
  -80  -100  -110  -100   -80    /* CG,E */
 -140  -150  -150  -140  -150    /* CG,A */
  -80  -100  -110  -100   -80    /* CG,C */
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.mismatch_hairpin[CG as usize][N as usize][N as usize], Some(-80));
        assert_eq!(tables.mismatch_hairpin[CG as usize][N as usize][A as usize], Some(-100));
    }

    #[test]
    fn test_parse_dangle() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# dangle5
/*   N     A     C     G     U          */
   -10   -50   -30   -20   -10    /* CG */
    -0   -20   -30    -0    -0    /* GC */
   -20   -30   -30   -40   -20    /* GU */
   -10   -30   -10   -20   -20    /* UG */
   -20   -30   -30   -40   -20    /* AU */
   -10   -30   -10   -20   -20    /* UA */
    -0   -20   -10    -0    -0    /* NN */
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.dangle5[CG as usize][N as usize], Some(-10));
        assert_eq!(tables.dangle5[CG as usize][A as usize], Some(-50));
    }

    #[test]
    fn test_parse_int11() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# int11
  90    90    50    50    50    /* CG,CG,N */
  90    90    50    50    50    /* CG,CG,A */
  50    50    50    50    50    /* CG,CG,C */
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.int11[CG as usize][CG as usize][N as usize][N as usize], Some(90));
        assert_eq!(tables.int11[CG as usize][CG as usize][N as usize][A as usize], Some(90));
        assert_eq!(tables.int11[CG as usize][CG as usize][N as usize][C as usize], Some(50));
    }

    #[test]
    fn test_parse_int22_skips_n() {
        use Base::*;
        use PairTypeRNA::*;
        let dummy = r#"
# int22
   120   160    20   160    /* CG,CG,A,A,A */
   110   150    20   150    /* CG,CG,A,A,C */
    20    60   -70    60    /* CG,CG,A,A,G */
   110   150    20   150    /* CG,CG,A,A,U */
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        let i1 = CG as usize;
        let i2 = A as usize;
        assert_eq!(tables.int22[i1][i1][i2][i2][i2][i2], Some(120));
        assert_eq!(tables.int22[i1][i1][i2][i2][i2][C as usize], Some(160));
    }

    #[test]
    fn test_parse_loops() {
        let dummy = r#"
# hairpin
   INF   INF   INF   540   560   570   540   600   550   640
   650   660   670   680   690   690   700   710   710   720
   720   730   730   740   740   750   750   750   760   760
   770
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.hairpin[0], None);
        assert_eq!(tables.hairpin[3], Some(540));
        assert_eq!(tables.hairpin[29], Some(760));
        assert_eq!(tables.hairpin[30], Some(770));
    }

    #[test]
    fn test_sequence_parsing() {
        let dummy = r#"
# Tetraloops
CCAAGG     330   -1030

# Triloops
CAACG     680    2370
"#;
        let tables = EnergyTables::from_str_data(dummy).unwrap();
        assert_eq!(tables.hairpin_sequences[&crate::NucleotideVec::try_from("CCAAGG").unwrap()], (330, -1030));
        assert_eq!(tables.hairpin_sequences[&crate::NucleotideVec::try_from("CAACG").unwrap()], (680, 2370));
    }

    #[test]
    fn test_rescale_is_identity_at_same_temperature() {
        let dummy = "\n# stack\n  -240  -330  -210  -140  -210  -210  -140\n  -330  -340  -250  -150  -220  -240  -150\n  -210  -250   130   -50  -140  -130   130\n  -140  -150   -50    30   -60  -100    30\n  -210  -220  -140   -60  -110   -90   -60\n  -210  -240  -130  -100   -90  -130   -90\n  -140  -150   130    30   -60   -90   130\n# stack_enthalpies\n  -240  -330  -210  -140  -210  -210  -140\n  -330  -340  -250  -150  -220  -240  -150\n  -210  -250   130   -50  -140  -130   130\n  -140  -150   -50    30   -60  -100    30\n  -210  -220  -140   -60  -110   -90   -60\n  -210  -240  -130  -100   -90  -130   -90\n  -140  -150   130    30   -60   -90   130\n";
        let mut tables = EnergyTables::from_str_data(dummy).unwrap();
        tables.rescale(1.0);
        assert_eq!(tables.stack[0][0], Some(-240));
    }
}
