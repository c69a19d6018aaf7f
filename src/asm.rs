//! The mnemonic-shaped emitter surface.
//!
//! Every method here assembles one Thumb (or, for the two ARM helpers,
//! ARM-mode) instruction and appends it to the underlying [`Object`]. A
//! literal immediate that is out of range or misaligned is reported as an
//! error immediately, and the opcode is still emitted with its immediate
//! field left zero, so `current_lc()` stays consistent with what was
//! actually written. A symbol-valued immediate always succeeds at emission
//! time; it is checked and patched later, in [`Object::link`].

use crate::basic_types::{Address, ByteVector, Immediate as ImmediateT};
use crate::error::Result;
use crate::immediate::Immediate;
use crate::object::Object;
use crate::operations::{
    AddSubOperation, AluOperation, ConditionCode, HighRegisterOperation, Imm8Operation,
    LdmiaStmiaOperation, PushPopOperation, ShiftOperation,
};
use crate::reference::{check_immediate_is_aligned, check_immediate_range, descriptor, ReferenceKind};
use crate::register_lists::{LowRegList, PopList, PushList};
use crate::registers::{LowReg, Reg, WritebackLowReg, R8};
use crate::symbol::Symbol;

/// A Thumb assembler generic over the symbol-name type used for labels.
///
/// [`crate::Assembler`] and [`crate::CompactAssembler`] are the two concrete
/// bindings callers actually use.
#[derive(Debug, Clone)]
pub struct ThumbAssembler<TSymbolName> {
    obj: Object<TSymbolName>,
}

impl<TSymbolName> ThumbAssembler<TSymbolName>
where
    TSymbolName: Clone + Ord,
{
    pub fn new() -> Self {
        ThumbAssembler { obj: Object::new() }
    }

    pub fn current_lc(&self) -> Address {
        self.obj.current_lc()
    }

    /// Resolves all pending references against `origin` and returns the
    /// finished byte image. Consumes the assembler: there is no supported
    /// way to keep emitting after linking.
    pub fn link(self, origin: Address) -> Result<ByteVector> {
        self.obj.link(origin)
    }

    ////////////////////////////////////////////////////////////////////////
    // Miscellaneous directives
    ////////////////////////////////////////////////////////////////////////

    /// `adr rd, label` -- loads a PC-relative address. Emitted as
    /// `add rd, pc, #0` with an `adr`-kind reference recorded against the
    /// label; the resolver fills in the real offset.
    pub fn adr(&mut self, rd: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.obj.add_reference(ReferenceKind::Adr, imm10.into());
        self.add_from_pc(rd, ImmediateT::from(0))
    }

    pub fn align(&mut self, alignment: u32) -> Result<&mut Self> {
        self.obj.align(alignment)?;
        Ok(self)
    }

    pub fn label(&mut self, symbol: Symbol<TSymbolName>) -> Result<&mut Self> {
        self.obj.add_symbol(symbol)?;
        Ok(self)
    }

    pub fn pool(&mut self) -> Result<&mut Self> {
        self.obj.emit_literal_pool()?;
        Ok(self)
    }

    ////////////////////////////////////////////////////////////////////////
    // Data definition directives
    ////////////////////////////////////////////////////////////////////////

    pub fn byte(&mut self, values: impl IntoIterator<Item = impl Into<Immediate<TSymbolName>>>) -> Result<&mut Self> {
        for v in values {
            let (bits, result) = self.resolve(ReferenceKind::Abs8Byte, &v.into());
            self.obj.emit8((bits & 0xff) as u8);
            result?;
        }
        Ok(self)
    }

    pub fn hword(&mut self, values: impl IntoIterator<Item = impl Into<Immediate<TSymbolName>>>) -> Result<&mut Self> {
        for v in values {
            let (bits, result) = self.resolve(ReferenceKind::Abs16, &v.into());
            self.obj.emit16((bits & 0xffff) as u16);
            result?;
        }
        Ok(self)
    }

    pub fn word(&mut self, values: impl IntoIterator<Item = impl Into<Immediate<TSymbolName>>>) -> Result<&mut Self> {
        for v in values {
            let (bits, result) = self.resolve(ReferenceKind::Abs32, &v.into());
            self.obj.emit32(bits as u32);
            result?;
        }
        Ok(self)
    }

    pub fn incbin(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            self.obj.emit8(b);
        }
        self
    }

    ////////////////////////////////////////////////////////////////////////
    // ARM code generation pseudo instructions
    ////////////////////////////////////////////////////////////////////////

    /// An unconditional ARM-mode branch, e.g. `b some_label` emitted from
    /// ARM state.
    pub fn arm_branch(&mut self, imm: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.obj.add_reference(ReferenceKind::ArmBranch, imm.into());
        self.obj.emit32(0);
        self
    }

    /// Switches from ARM state to Thumb state:
    /// ```text
    /// add r, pc, #1
    /// bx r
    /// thumb_start:
    /// ```
    /// `r` may be freely chosen; after the switch it holds `thumb_start + 1`.
    pub fn arm_to_thumb(&mut self, r: Reg) -> &mut Self {
        self.obj.emit32((0xe28f_u32 << 16) | (u32::from(r.n()) << 12) | 0x001);
        self.obj.emit32((0xe12f_ff1_u32 << 4) | u32::from(r.n()));
        self
    }

    ////////////////////////////////////////////////////////////////////////
    // Thumb instructions
    ////////////////////////////////////////////////////////////////////////

    pub fn adc(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Adc, rx.into(), rm.into())
    }

    /// `add rx, rx, #imm8`.
    pub fn add_imm8(&mut self, rx: LowReg, imm8: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_add_sub_imm8(Imm8Operation::Add, rx, imm8.into())
    }

    /// `add rd, rn, #imm3`.
    pub fn add_imm3(
        &mut self,
        rd: LowReg,
        rn: LowReg,
        imm3: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_add_sub_imm3(AddSubOperation::Add, rd.into(), rn.into(), imm3.into())
    }

    /// `add sp, sp, #imm9` (imm9 is a multiple of 4).
    pub fn add_sp_imm9(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_add_sub_sp_imm9(AddSubOperation::Add, imm9.into())
    }

    /// `add rd, sp, #imm10` (imm10 is a multiple of 4) -- loads an
    /// SP-relative address.
    pub fn add_from_sp(&mut self, rd: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_load_address(true, rd, imm10.into())
    }

    /// `add rd, pc, #imm10` (imm10 is a multiple of 4) -- loads a
    /// PC-relative address. This is the instruction `adr` assembles into.
    pub fn add_from_pc(&mut self, rd: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_load_address(false, rd, imm10.into())
    }

    /// `add rd, rn, rm`, all low registers.
    pub fn add_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_add_sub_register(AddSubOperation::Add, rd.into(), rn.into(), rm.into())
    }

    /// `add rx, rm`, any registers. On ARMv4T, adding two low registers
    /// through the high-register encoding is unpredictable, so that case is
    /// rewritten as the low-register-triple form.
    pub fn add_any(&mut self, rx: Reg, rm: Reg) -> &mut Self {
        if all_low(rx, rm) {
            self.emit_add_sub_register(AddSubOperation::Add, rx, rx, rm)
        } else {
            self.emit_high_register_operation(HighRegisterOperation::Add, rx, rm)
        }
    }

    pub fn and_(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::And, rx.into(), rm.into())
    }

    /// `asr rd, rn, #shift` (shift in `0..=32`).
    pub fn asr_imm(&mut self, rd: LowReg, rn: LowReg, imm5: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_asr_lsr_imm5(ShiftOperation::Asr, rd, rn, imm5.into())
    }

    pub fn asr_reg(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Asr, rx.into(), rm.into())
    }

    pub fn beq(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Eq, imm9.into())
    }
    pub fn bne(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Ne, imm9.into())
    }
    pub fn bcs(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Cs, imm9.into())
    }
    pub fn bcc(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Cc, imm9.into())
    }
    pub fn bmi(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Mi, imm9.into())
    }
    pub fn bpl(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Pl, imm9.into())
    }
    pub fn bvs(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Vs, imm9.into())
    }
    pub fn bvc(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Vc, imm9.into())
    }
    pub fn bhi(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Hi, imm9.into())
    }
    pub fn bls(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Ls, imm9.into())
    }
    pub fn bge(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Ge, imm9.into())
    }
    pub fn blt(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Lt, imm9.into())
    }
    pub fn bgt(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Gt, imm9.into())
    }
    pub fn ble(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.emit_conditional_branch(ConditionCode::Le, imm9.into())
    }

    /// Unconditional Thumb branch, `b label`.
    pub fn b(&mut self, imm12: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.obj.add_reference(ReferenceKind::UnconditionalBranch, imm12.into());
        self.obj.emit16(0);
        self
    }

    pub fn bic(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Bic, rx.into(), rm.into())
    }

    pub fn bl(&mut self, imm23: impl Into<Immediate<TSymbolName>>) -> &mut Self {
        self.obj.add_reference(ReferenceKind::Bl, imm23.into());
        self.obj.emit32(0);
        self
    }

    pub fn bx(&mut self, rm: Reg) -> &mut Self {
        self.obj.emit16((0b010001110_u16 << 7) | (u16::from(rm.n()) << 3));
        self
    }

    pub fn cmn(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Cmn, rx.into(), rm.into())
    }

    pub fn cmp_imm8(&mut self, rd: LowReg, imm8: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_cmp_mov_imm8(Imm8Operation::Cmp, rd, imm8.into())
    }

    pub fn cmp_reg(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Cmp, rx.into(), rm.into())
    }

    /// `cmp rx, rm`, any registers. Low-low is rewritten to the ALU `cmp`
    /// encoding, same rationale as [`Self::add_any`].
    pub fn cmp_any(&mut self, rx: Reg, rm: Reg) -> &mut Self {
        if all_low(rx, rm) {
            self.emit_alu_operation(AluOperation::Cmp, rx, rm)
        } else {
            self.emit_high_register_operation(HighRegisterOperation::Cmp, rx, rm)
        }
    }

    pub fn eor(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Eor, rx.into(), rm.into())
    }

    pub fn ldmia(&mut self, rn: WritebackLowReg, list: LowRegList) -> &mut Self {
        self.emit_ldmia_stmia(LdmiaStmiaOperation::Ldmia, rn, list)
    }

    /// `ldr rd, [rn, #imm7]` (imm7 is a multiple of 4).
    pub fn ldr_imm(
        &mut self,
        rd: LowReg,
        rn: LowReg,
        imm7: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_word(true, rd, rn, imm7.into())
    }

    /// `ldr rd, [pc, #imm10]` (imm10 is a multiple of 4).
    pub fn ldr_pc(&mut self, rd: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs10, &imm10.into());
        self.obj
            .emit16((0b01001_u16 << 11) | (u16::from(rd.n()) << 8) | ((bits as u16) / 4));
        result?;
        Ok(self)
    }

    /// `ldr rd, [sp, #imm10]` (imm10 is a multiple of 4).
    pub fn ldr_sp(&mut self, rd: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_sp_relative_load_store(true, rd, imm10.into())
    }

    /// `ldr rd, [rn, rm]`.
    pub fn ldr_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_with_register_offset(true, false, rd, rn, rm)
    }

    /// `ldr rd, =imm` -- loads a 32-bit constant via the literal pool.
    /// Always assembles a real `ldr`, never a `mov`: unlike ARM state,
    /// Thumb's `mov` sets flags, so it cannot stand in for this.
    pub fn ldr_literal(&mut self, rd: LowReg, imm: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.obj.add_reference_to_literal(imm.into());
        self.ldr_pc(rd, ImmediateT::from(0))
    }

    /// `ldrb rd, [rn, #imm5]`.
    pub fn ldrb_imm(
        &mut self,
        rd: LowReg,
        rn: LowReg,
        imm5: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_byte(true, rd, rn, imm5.into())
    }

    pub fn ldrb_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_with_register_offset(true, true, rd, rn, rm)
    }

    /// `ldrh rd, [rn, #imm6]` (imm6 is a multiple of 2).
    pub fn ldrh_imm(
        &mut self,
        rd: LowReg,
        rn: LowReg,
        imm6: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_halfword(true, rd, rn, imm6.into())
    }

    pub fn ldrh_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_sign_extended(true, false, rd, rn, rm)
    }

    pub fn ldrsb_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_sign_extended(false, true, rd, rn, rm)
    }

    pub fn ldrsh_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_sign_extended(true, true, rd, rn, rm)
    }

    pub fn lsl_imm(&mut self, rd: LowReg, rn: LowReg, imm5: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs5, &imm5.into());
        self.obj.emit16(
            (0b00000_u16 << 11) | ((bits as u16) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd.n()),
        );
        result?;
        Ok(self)
    }

    pub fn lsl_reg(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Lsl, rx.into(), rm.into())
    }

    pub fn lsr_imm(&mut self, rd: LowReg, rn: LowReg, imm5: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_asr_lsr_imm5(ShiftOperation::Lsr, rd, rn, imm5.into())
    }

    pub fn lsr_reg(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Lsr, rx.into(), rm.into())
    }

    pub fn mov_imm8(&mut self, rd: LowReg, imm8: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_cmp_mov_imm8(Imm8Operation::Mov, rd, imm8.into())
    }

    /// `mov rx, rm`, any registers. Low-low is unpredictable prior to
    /// ARMv6T2 and is rewritten as `add rx, rm, #0`.
    pub fn mov_any(&mut self, rx: Reg, rm: Reg) -> &mut Self {
        if all_low(rx, rm) {
            self.emit_add_sub_imm3(AddSubOperation::Add, rx, rm, ImmediateT::from(0).into())
                .expect("a literal 0 immediate is always in range")
        } else {
            self.emit_high_register_operation(HighRegisterOperation::Mov, rx, rm)
        }
    }

    pub fn mul(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Mul, rx.into(), rm.into())
    }

    pub fn mvn(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Mvn, rx.into(), rm.into())
    }

    pub fn neg(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Neg, rx.into(), rm.into())
    }

    /// `nop`, encoded as `mov r8, r8` per the ARMv4T convention (Thumb has
    /// no dedicated `nop` opcode).
    pub fn nop(&mut self) -> &mut Self {
        self.mov_any(R8, R8)
    }

    pub fn orr(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Orr, rx.into(), rm.into())
    }

    pub fn pop(&mut self, list: PopList) -> &mut Self {
        self.emit_push_pop(PushPopOperation::Pop, list.n())
    }

    pub fn push(&mut self, list: PushList) -> &mut Self {
        self.emit_push_pop(PushPopOperation::Push, list.n())
    }

    pub fn ror(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Ror, rx.into(), rm.into())
    }

    pub fn sbc(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Sbc, rx.into(), rm.into())
    }

    pub fn stmia(&mut self, rn: WritebackLowReg, list: LowRegList) -> Result<&mut Self> {
        if list.contains(rn.reg()) && !list.is_lowest(rn.reg()) {
            return err_unpredictable("stmia writeback register is in its own list and is not the lowest register in it");
        }
        Ok(self.emit_ldmia_stmia(LdmiaStmiaOperation::Stmia, rn, list))
    }

    /// `str rs, [rn, #imm7]` (imm7 is a multiple of 4).
    pub fn str_imm(
        &mut self,
        rs: LowReg,
        rn: LowReg,
        imm7: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_word(false, rs, rn, imm7.into())
    }

    /// `str rs, [sp, #imm10]` (imm10 is a multiple of 4).
    pub fn str_sp(&mut self, rs: LowReg, imm10: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_sp_relative_load_store(false, rs, imm10.into())
    }

    pub fn str_reg(&mut self, rs: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_with_register_offset(false, false, rs, rn, rm)
    }

    /// `strb rs, [rn, #imm5]`.
    pub fn strb_imm(
        &mut self,
        rs: LowReg,
        rn: LowReg,
        imm5: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_byte(false, rs, rn, imm5.into())
    }

    pub fn strb_reg(&mut self, rs: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_with_register_offset(false, true, rs, rn, rm)
    }

    /// `strh rs, [rn, #imm6]` (imm6 is a multiple of 2).
    pub fn strh_imm(
        &mut self,
        rs: LowReg,
        rn: LowReg,
        imm6: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_load_store_halfword(false, rs, rn, imm6.into())
    }

    pub fn strh_reg(&mut self, rs: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_load_store_sign_extended(false, false, rs, rn, rm)
    }

    /// `sub rd, rn, #imm3`.
    pub fn sub_imm3(
        &mut self,
        rd: LowReg,
        rn: LowReg,
        imm3: impl Into<Immediate<TSymbolName>>,
    ) -> Result<&mut Self> {
        self.emit_add_sub_imm3(AddSubOperation::Sub, rd.into(), rn.into(), imm3.into())
    }

    /// `sub rx, rx, #imm8`.
    pub fn sub_imm8(&mut self, rx: LowReg, imm8: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_add_sub_imm8(Imm8Operation::Sub, rx, imm8.into())
    }

    /// `sub sp, sp, #imm9` (imm9 is a multiple of 4).
    pub fn sub_sp_imm9(&mut self, imm9: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        self.emit_add_sub_sp_imm9(AddSubOperation::Sub, imm9.into())
    }

    pub fn sub_reg(&mut self, rd: LowReg, rn: LowReg, rm: LowReg) -> &mut Self {
        self.emit_add_sub_register(AddSubOperation::Sub, rd.into(), rn.into(), rm.into())
    }

    pub fn swi(&mut self, imm8: impl Into<Immediate<TSymbolName>>) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs8Unsigned, &imm8.into());
        self.obj.emit16((0b11011111_u16 << 8) | (bits as u16));
        result?;
        Ok(self)
    }

    pub fn tst(&mut self, rx: LowReg, rm: LowReg) -> &mut Self {
        self.emit_alu_operation(AluOperation::Tst, rx.into(), rm.into())
    }

    ////////////////////////////////////////////////////////////////////////
    // Private encoding helpers
    ////////////////////////////////////////////////////////////////////////

    /// Resolves one emission-time immediate against `kind`'s descriptor.
    ///
    /// A symbol reference always succeeds, registering a fixup and yielding
    /// 0 as the placeholder. A literal is range- and alignment-checked; on
    /// failure the placeholder 0 is still returned so the caller can emit a
    /// well-formed (if ultimately erroneous) opcode and propagate the error
    /// afterward.
    fn resolve(&mut self, kind: ReferenceKind, imm: &Immediate<TSymbolName>) -> (i32, Result<()>) {
        if imm.is_symbol_reference() {
            self.obj.add_reference(kind, imm.clone());
            return (0, Ok(()));
        }

        let d = descriptor(kind);
        let v = imm.value();
        if let Err(e) = check_immediate_range(i64::from(v), d.min, d.max) {
            return (0, Err(e));
        }
        if let Err(e) = check_immediate_is_aligned(i64::from(v), d.alignment) {
            return (0, Err(e));
        }
        (v, Ok(()))
    }

    fn emit_asr_lsr_imm5(
        &mut self,
        operation: ShiftOperation,
        rd: LowReg,
        rn: LowReg,
        imm5: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        let is_symbolic = imm5.is_symbol_reference();
        let (bits, result) = self.resolve(ReferenceKind::Abs5AsrLsr, &imm5);

        if bits == 0 && !is_symbolic {
            // A known shift count of 0 can only be expressed as lsl #0;
            // asr/lsr cannot shift by 0. A symbolic shift count cannot be
            // rewritten here because its value (and thus whether this
            // rewrite applies) is not known until link time -- see
            // Object's fix_abs5_asr_lsr.
            result?;
            return self.lsl_imm(rd, rn, ImmediateT::from(0));
        }

        self.obj.emit16(
            ((operation as u16) << 11) | (((bits & 31) as u16) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd.n()),
        );
        result?;
        Ok(self)
    }

    fn emit_add_sub_register(&mut self, operation: AddSubOperation, rd: Reg, rn: Reg, rm: Reg) -> &mut Self {
        debug_assert!(all_low(rd, rn) && rm.is_low());
        self.obj.emit16(
            (0b000110_u16 << 10) | ((operation as u16) << 9) | (u16::from(rm.n()) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd.n()),
        );
        self
    }

    fn emit_add_sub_imm3(
        &mut self,
        operation: AddSubOperation,
        rd: Reg,
        rn: Reg,
        imm3: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        debug_assert!(all_low(rd, rn));
        let (bits, result) = self.resolve(ReferenceKind::Abs3, &imm3);
        let (operation, bits) = invert_add_sub_if_negative(operation, bits);
        self.obj.emit16(
            (0b000111_u16 << 10) | ((operation as u16) << 9) | ((bits as u16) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd.n()),
        );
        result?;
        Ok(self)
    }

    fn emit_add_sub_imm8(
        &mut self,
        operation: Imm8Operation,
        rx: LowReg,
        imm8: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        debug_assert!(matches!(operation, Imm8Operation::Add | Imm8Operation::Sub));
        let (bits, result) = self.resolve(ReferenceKind::Abs8AddSub, &imm8);
        let (operation, bits) = invert_imm8_if_negative(operation, bits);
        self.obj
            .emit16((0b001_u16 << 13) | ((operation as u16) << 11) | (u16::from(rx.n()) << 8) | (bits as u16));
        result?;
        Ok(self)
    }

    fn emit_cmp_mov_imm8(
        &mut self,
        operation: Imm8Operation,
        rd: LowReg,
        imm8: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        debug_assert!(matches!(operation, Imm8Operation::Cmp | Imm8Operation::Mov));
        let (bits, result) = self.resolve(ReferenceKind::Abs8Unsigned, &imm8);
        self.obj
            .emit16((0b001_u16 << 13) | ((operation as u16) << 11) | (u16::from(rd.n()) << 8) | (bits as u16));
        result?;
        Ok(self)
    }

    fn emit_alu_operation(&mut self, operation: AluOperation, rx: Reg, rm: Reg) -> &mut Self {
        debug_assert!(all_low(rx, rm));
        self.obj
            .emit16((0b010000_u16 << 10) | ((operation as u16) << 6) | (u16::from(rm.n()) << 3) | u16::from(rx.n()));
        self
    }

    fn emit_high_register_operation(&mut self, operation: HighRegisterOperation, rx: Reg, rm: Reg) -> &mut Self {
        debug_assert!(!all_low(rx, rm));
        self.obj.emit16(
            (0b010001_u16 << 10)
                | ((operation as u16) << 8)
                | (u16::from(rx.high_bit()) << 7)
                | (u16::from(rm.n()) << 3)
                | u16::from(rx.low_bits()),
        );
        self
    }

    fn emit_load_store_with_register_offset(
        &mut self,
        is_load: bool,
        is_byte: bool,
        rd_rs: LowReg,
        rn: LowReg,
        rm: LowReg,
    ) -> &mut Self {
        self.obj.emit16(
            (0b0101000_u16 << 9)
                | ((is_load as u16) << 11)
                | ((is_byte as u16) << 10)
                | (u16::from(rm.n()) << 6)
                | (u16::from(rn.n()) << 3)
                | u16::from(rd_rs.n()),
        );
        self
    }

    fn emit_load_store_sign_extended(
        &mut self,
        is_halfword: bool,
        is_sign_extended: bool,
        rd_rs: LowReg,
        rn: LowReg,
        rm: LowReg,
    ) -> &mut Self {
        self.obj.emit16(
            (0b0101001_u16 << 9)
                | ((is_halfword as u16) << 11)
                | ((is_sign_extended as u16) << 10)
                | (u16::from(rm.n()) << 6)
                | (u16::from(rn.n()) << 3)
                | u16::from(rd_rs.n()),
        );
        self
    }

    fn emit_add_sub_sp_imm9(&mut self, operation: AddSubOperation, imm9: Immediate<TSymbolName>) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs9AddSubSp, &imm9);
        let (operation, bits) = invert_add_sub_if_negative(operation, bits);
        self.obj
            .emit16((0b10110000_u16 << 8) | ((operation as u16) << 7) | ((bits as u16) / 4));
        result?;
        Ok(self)
    }

    fn emit_push_pop(&mut self, operation: PushPopOperation, list_mask: u16) -> &mut Self {
        debug_assert!((1..=511).contains(&list_mask));
        self.obj.emit16(((operation as u16) << 9) | list_mask);
        self
    }

    fn emit_ldmia_stmia(&mut self, operation: LdmiaStmiaOperation, rn: WritebackLowReg, list: LowRegList) -> &mut Self {
        debug_assert!((1..=255).contains(&list.n()));
        self.obj
            .emit16(((operation as u16) << 11) | (u16::from(rn.n()) << 8) | list.n());
        self
    }

    fn emit_sp_relative_load_store(
        &mut self,
        is_load: bool,
        rd_rs: LowReg,
        imm10: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs10, &imm10);
        self.obj
            .emit16((0b1001_u16 << 12) | ((is_load as u16) << 11) | (u16::from(rd_rs.n()) << 8) | ((bits as u16) / 4));
        result?;
        Ok(self)
    }

    fn emit_load_store_byte(
        &mut self,
        is_load: bool,
        rd_rs: LowReg,
        rn: LowReg,
        imm5: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs5, &imm5);
        self.obj.emit16(
            (0b0111_u16 << 12) | ((is_load as u16) << 11) | ((bits as u16) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd_rs.n()),
        );
        result?;
        Ok(self)
    }

    fn emit_load_store_halfword(
        &mut self,
        is_load: bool,
        rd_rs: LowReg,
        rn: LowReg,
        imm6: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs6, &imm6);
        self.obj.emit16(
            (0b1000_u16 << 12) | ((is_load as u16) << 11) | (((bits as u16) / 2) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd_rs.n()),
        );
        result?;
        Ok(self)
    }

    fn emit_load_store_word(
        &mut self,
        is_load: bool,
        rd_rs: LowReg,
        rn: LowReg,
        imm7: Immediate<TSymbolName>,
    ) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs7, &imm7);
        self.obj.emit16(
            (0b0110_u16 << 12) | ((is_load as u16) << 11) | (((bits as u16) / 4) << 6) | (u16::from(rn.n()) << 3) | u16::from(rd_rs.n()),
        );
        result?;
        Ok(self)
    }

    fn emit_load_address(&mut self, is_sp: bool, rd: LowReg, imm10: Immediate<TSymbolName>) -> Result<&mut Self> {
        let (bits, result) = self.resolve(ReferenceKind::Abs10, &imm10);
        self.obj
            .emit16((0b1010_u16 << 12) | ((is_sp as u16) << 11) | (u16::from(rd.n()) << 8) | ((bits as u16) / 4));
        result?;
        Ok(self)
    }

    fn emit_conditional_branch(&mut self, cc: ConditionCode, imm9: Immediate<TSymbolName>) -> &mut Self {
        self.obj.add_reference(ReferenceKind::ConditionalBranch, imm9);
        self.obj.emit16((0b1101_u16 << 12) | ((cc as u16) << 8));
        self
    }
}

fn all_low(a: Reg, b: Reg) -> bool {
    a.is_low() && b.is_low()
}

fn invert_add_sub_if_negative(operation: AddSubOperation, imm: i32) -> (AddSubOperation, i32) {
    if imm < 0 {
        (operation.invert(), imm.abs())
    } else {
        (operation, imm)
    }
}

fn invert_imm8_if_negative(operation: Imm8Operation, imm: i32) -> (Imm8Operation, i32) {
    if imm < 0 {
        (operation.invert(), imm.abs())
    } else {
        (operation, imm)
    }
}

fn err_unpredictable<T>(message: &'static str) -> Result<T> {
    Err(crate::error::AssemblerError::new(crate::error::Reason::Unpredictable(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::*;

    #[test]
    fn label_then_pc_relative_add_sub_scenario() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.label(Symbol::new("L".to_string())).unwrap();
        a.add_imm3(R0, R7, "L").unwrap();
        a.sub_imm3(R7, R0, "L").unwrap();
        let bytes = a.link(4).unwrap();
        assert_eq!(bytes, vec![0x38, 0x1D, 0x07, 0x1F]);
    }

    #[test]
    fn conditional_branch_to_self() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.beq("L");
        a.label(Symbol::new("L".to_string())).unwrap();
        let bytes = a.link(0x80).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xD0]);
    }

    #[test]
    fn literal_pool_deduplicates_equal_constants() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.ldr_literal(R0, 0x01234567).unwrap();
        a.ldr_literal(R0, 0x01234567).unwrap();
        a.ldr_literal(R0, 0x89ABCDEFu32 as i32).unwrap();
        a.pool().unwrap();
        let bytes = a.link(0x40302010).unwrap();
        assert_eq!(
            bytes,
            vec![0x02, 0x48, 0x02, 0x48, 0x02, 0x48, 0x67, 0x45, 0x23, 0x01, 0xEF, 0xCD, 0xAB, 0x89]
        );
    }

    #[test]
    fn negative_sp_offset_flips_add_to_sub() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.add_sp_imm9(-0x1FC).unwrap();
        let bytes = a.link(0).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xB0]);
    }

    #[test]
    fn stmia_writeback_register_must_be_lowest_in_its_list() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        let list = crate::register_lists::low_reg_range(R0, R7);
        a.stmia(!R0, list).unwrap();
        let bytes = a.link(0).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xC0]);

        let mut b: ThumbAssembler<String> = ThumbAssembler::new();
        let err = b.stmia(!R1, list).unwrap_err();
        assert!(matches!(err.reason(), crate::error::Reason::Unpredictable(_)));
    }

    #[test]
    fn arm_branch_with_resolved_relative_zero() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.arm_branch(8);
        let bytes = a.link(0).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0xEA]);
    }

    #[test]
    fn asr_by_a_known_zero_emits_lsl() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.asr_imm(R0, R1, 0).unwrap();
        let bytes = a.link(0).unwrap();
        // lsl r0, r1, #0 => 0000 0|00000|001|000
        assert_eq!(bytes, vec![0x08, 0x00]);
    }

    #[test]
    fn sp_and_pc_constants_use_the_correct_base_register() {
        assert_eq!(SP.n(), 13);
        assert_eq!(PC.n(), 15);
    }

    #[test]
    fn alu_operations_pack_op_and_registers_into_the_shared_encoding() {
        let cases: &[(fn(&mut ThumbAssembler<String>, LowReg, LowReg) -> &mut ThumbAssembler<String>, u8, u8, u16)] = &[
            (ThumbAssembler::<String>::adc, 0, 1, 0x4148),
            (ThumbAssembler::<String>::and_, 2, 3, 0x401A),
            (ThumbAssembler::<String>::bic, 4, 5, 0x43AC),
            (ThumbAssembler::<String>::eor, 0, 1, 0x4048),
            (ThumbAssembler::<String>::orr, 6, 7, 0x433E),
            (ThumbAssembler::<String>::neg, 1, 2, 0x4251),
            (ThumbAssembler::<String>::mul, 3, 4, 0x4363),
            (ThumbAssembler::<String>::mvn, 0, 1, 0x43C8),
            (ThumbAssembler::<String>::cmn, 2, 3, 0x42DA),
            (ThumbAssembler::<String>::tst, 0, 1, 0x4208),
            (ThumbAssembler::<String>::cmp_reg, 0, 1, 0x4288),
        ];
        for (op, rx, rm, expected) in cases {
            let mut a: ThumbAssembler<String> = ThumbAssembler::new();
            op(&mut a, LowReg::new(*rx), LowReg::new(*rm));
            let bytes = a.link(0).unwrap();
            assert_eq!(bytes, expected.to_le_bytes().to_vec(), "rx={rx} rm={rm}");
        }
    }

    #[test]
    fn high_register_operations_split_the_fourth_register_bit() {
        let mut add: ThumbAssembler<String> = ThumbAssembler::new();
        add.add_any(R8, R9);
        assert_eq!(add.link(0).unwrap(), 0x4528u16.to_le_bytes().to_vec());

        let mut cmp: ThumbAssembler<String> = ThumbAssembler::new();
        cmp.cmp_any(R9, Reg::from(R0));
        assert_eq!(cmp.link(0).unwrap(), 0x4581u16.to_le_bytes().to_vec());

        let mut mov: ThumbAssembler<String> = ThumbAssembler::new();
        mov.mov_any(R9, R8);
        assert_eq!(mov.link(0).unwrap(), 0x46C1u16.to_le_bytes().to_vec());
    }

    #[test]
    fn bx_branches_to_a_high_register() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.bx(LR);
        assert_eq!(a.link(0).unwrap(), 0x4770u16.to_le_bytes().to_vec());
    }

    #[test]
    fn load_store_with_register_offset_distinguishes_load_and_byte() {
        let mut a: ThumbAssembler<String> = ThumbAssembler::new();
        a.ldrb_reg(R0, R1, R2);
        assert_eq!(a.link(0).unwrap(), 0x5C88u16.to_le_bytes().to_vec());
    }

    #[test]
    fn load_store_sign_extended_distinguishes_halfword_and_sign() {
        let mut h: ThumbAssembler<String> = ThumbAssembler::new();
        h.ldrh_reg(R3, R4, R5);
        assert_eq!(h.link(0).unwrap(), 0x5B63u16.to_le_bytes().to_vec());

        let mut sb: ThumbAssembler<String> = ThumbAssembler::new();
        sb.ldrsb_reg(R0, R1, R2);
        assert_eq!(sb.link(0).unwrap(), 0x5688u16.to_le_bytes().to_vec());

        let mut sh: ThumbAssembler<String> = ThumbAssembler::new();
        sh.ldrsh_reg(R0, R1, R2);
        assert_eq!(sh.link(0).unwrap(), 0x5E88u16.to_le_bytes().to_vec());
    }
}
