//! MLM instrument slots.
//!
//! Every instrument compiles to a fixed 32-byte slot so the driver can index
//! the bank directly. FM slots carry the YM2610 register image; SSG slots
//! point at their control macros; the single ADPCM-A slot points at the
//! song's sample list.

use super::other_data::{odata_sym_name, ControlMacro, MacroKind, OtherData};
use crate::bits::signed2unsigned_3;
use crate::dmf;
use crate::sym_table::SymbolTable;
use crate::{MlmError, Result};

/// Size of one compiled instrument slot.
pub const MLM_INSTRUMENT_SIZE: usize = 32;

const FM_OPERATOR_SIZE: usize = 7;

/// One FM operator, packed into the driver's register fields.
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct FmOperator {
    pub dtmul: u8,
    pub tl: u8,
    pub ksar: u8,
    pub amdr: u8,
    pub sr: u8,
    pub slrr: u8,
    pub eg: u8,
}

impl FmOperator {
    /// Pack a parsed DMF operator into register fields.
    pub fn from_dmf_op(op: &dmf::FmOperator) -> Self {
        FmOperator {
            dtmul: op.mult | (signed2unsigned_3(op.dt) << 4),
            tl: op.tl,
            ksar: op.ar | (op.rs << 6),
            amdr: op.dr | ((op.am as u8) << 7),
            sr: op.d2r,
            slrr: op.rr | (op.sl << 4),
            eg: op.ssg_mode | ((op.ssg_enabled as u8) << 3),
        }
    }

    fn compile(&self) -> [u8; FM_OPERATOR_SIZE] {
        [
            self.dtmul, self.tl, self.ksar, self.amdr, self.sr, self.slrr, self.eg,
        ]
    }
}

/// An FM voice slot.
#[derive(Debug, Clone)]
pub struct FmInstrument {
    /// Feedback/algorithm register image.
    pub fbalgo: u8,
    /// AMS/PMS register image.
    pub amspms: u8,
    /// Operator enable bits, OP1..OP4.
    pub op_enable: [bool; dmf::FM_OP_COUNT],
    /// Operators in register order.
    pub operators: [FmOperator; dmf::FM_OP_COUNT],
}

impl FmInstrument {
    /// Convert a parsed DMF FM instrument.
    pub fn from_dmf_inst(dinst: &dmf::FmInstrument) -> Self {
        let mut operators = [FmOperator::default(); dmf::FM_OP_COUNT];
        for (slot, op) in operators.iter_mut().zip(&dinst.operators) {
            *slot = FmOperator::from_dmf_op(op);
        }
        FmInstrument {
            fbalgo: dinst.algorithm | (dinst.feedback << 3),
            amspms: dinst.fms | (dinst.ams << 4),
            op_enable: [true; dmf::FM_OP_COUNT],
            operators,
        }
    }

    fn compile(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(MLM_INSTRUMENT_SIZE);
        data.push(self.fbalgo);
        data.push(self.amspms);

        let mut enable = 0u8;
        for (i, &on) in self.op_enable.iter().enumerate() {
            enable |= (on as u8) << (i + 4);
        }
        data.push(enable);

        for op in &self.operators {
            data.extend_from_slice(&op.compile());
        }
        data.push(0);
        data
    }
}

/// SSG tone/noise mixing selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsgMixing {
    /// Both generators off.
    None = 0,
    /// Tone only.
    Tone = 1,
    /// Noise only.
    Noise = 2,
    /// Tone and noise.
    Both = 3,
}

impl SsgMixing {
    fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => SsgMixing::None,
            1 => SsgMixing::Tone,
            2 => SsgMixing::Noise,
            3 => SsgMixing::Both,
            other => {
                return Err(MlmError::Domain(format!(
                    "invalid SSG mixing value {other}"
                )))
            }
        })
    }
}

/// An SSG voice slot: mixing mode plus up to three macro pointers.
#[derive(Debug, Clone)]
pub struct SsgInstrument {
    /// Initial mixing mode.
    pub mixing: SsgMixing,
    /// Auxiliary-data index of the mixing macro.
    pub mix_macro: Option<usize>,
    /// Auxiliary-data index of the volume macro.
    pub vol_macro: Option<usize>,
    /// Auxiliary-data index of the arpeggio macro.
    pub arp_macro: Option<usize>,
}

impl SsgInstrument {
    /// Convert a parsed DMF STD instrument.
    ///
    /// Non-empty macros become auxiliary-data records; `odata_count` is the
    /// index the first new record will get, and the returned records must be
    /// appended to the song's auxiliary data in order.
    pub fn from_dmf_inst(
        dinst: &dmf::StdInstrument,
        mut odata_count: usize,
    ) -> Result<(Self, Vec<OtherData>)> {
        let mixing = match dinst.chmode_macro.envelope_values.first() {
            None => SsgMixing::Tone,
            Some(&v) => SsgMixing::from_value(v + 1)?,
        };

        let mut inst = SsgInstrument {
            mixing,
            mix_macro: None,
            vol_macro: None,
            arp_macro: None,
        };
        let mut new_odata = Vec::new();

        let macros = [
            (&dinst.chmode_macro, MacroKind::Mix),
            (&dinst.volume_macro, MacroKind::Vol),
            (&dinst.arpeggio_macro, MacroKind::Arp),
        ];
        for (dmacro, kind) in macros {
            if let Some(control) = ControlMacro::from_dmf_macro(dmacro, kind) {
                match kind {
                    MacroKind::Mix => inst.mix_macro = Some(odata_count),
                    MacroKind::Vol => inst.vol_macro = Some(odata_count),
                    MacroKind::Arp => inst.arp_macro = Some(odata_count),
                }
                new_odata.push(OtherData::ControlMacro(control));
                odata_count += 1;
            }
        }

        Ok((inst, new_odata))
    }

    fn compile(&self, symbols: &mut SymbolTable, head_ofs: usize) -> Vec<u8> {
        let mut data = vec![0u8; MLM_INSTRUMENT_SIZE];
        data[0] = self.mixing as u8;
        data[1] = 0; // EG enable

        let macros = [self.mix_macro, self.vol_macro, self.arp_macro];
        for (i, macro_idx) in macros.into_iter().enumerate() {
            let ofs = 5 + i * 2;
            if let Some(idx) = macro_idx {
                symbols.add_ref(&odata_sym_name(idx), head_ofs + ofs);
                data[ofs] = 0xFF;
                data[ofs + 1] = 0xFF;
            }
            // Absent macros keep the 0x0000 NULL pointer.
        }
        data
    }
}

/// The ADPCM-A slot, pointing at the song's sample list.
#[derive(Debug, Clone)]
pub struct AdpcmaInstrument {
    /// Auxiliary-data index of the sample list.
    pub sample_list: usize,
}

impl AdpcmaInstrument {
    fn compile(&self, symbols: &mut SymbolTable, head_ofs: usize) -> Vec<u8> {
        let mut data = vec![0u8; MLM_INSTRUMENT_SIZE];
        symbols.add_ref(&odata_sym_name(self.sample_list), head_ofs);
        data[0] = 0xFF;
        data[1] = 0xFF;
        data
    }
}

/// Any compiled instrument slot.
#[derive(Debug, Clone)]
pub enum Instrument {
    /// FM voice.
    Fm(FmInstrument),
    /// SSG voice.
    Ssg(SsgInstrument),
    /// ADPCM-A sample bank.
    Adpcma(AdpcmaInstrument),
}

impl Instrument {
    /// Serialize the 32-byte slot, registering macro/sample-list pointer
    /// references at their offsets.
    pub fn compile(&self, symbols: &mut SymbolTable, head_ofs: usize) -> Vec<u8> {
        match self {
            Instrument::Fm(inst) => inst.compile(),
            Instrument::Ssg(inst) => inst.compile(symbols, head_ofs),
            Instrument::Adpcma(inst) => inst.compile(symbols, head_ofs),
        }
    }
}
