//! The external-assembler boundary.
//!
//! `nasm` is a subprocess the emitter shells out to; the rest of the crate
//! never links against an assembler library. `FakeAssembler` lets
//! `tests/*.rs` exercise the whole image-layout pipeline without `nasm`
//! installed, recording requests and writing stub bytes in its place.

use crate::error::LongError;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait Assembler {
    fn assemble(&self, input_path: &Path, output_path: &Path) -> Result<(), LongError>;
}

pub struct Nasm;

impl Assembler for Nasm {
    fn assemble(&self, input_path: &Path, output_path: &Path) -> Result<(), LongError> {
        let status = Command::new("nasm")
            .arg("-f")
            .arg("bin")
            .arg(input_path)
            .arg("-o")
            .arg(output_path)
            .status()
            .map_err(|e| {
                LongError::io(format!(
                    "could not run nasm (is it installed and on PATH?): {e}"
                ))
            })?;
        if !status.success() {
            return Err(LongError::io(format!(
                "nasm exited with {status} assembling {}",
                input_path.display()
            )));
        }
        Ok(())
    }
}

/// Records every request it receives and writes a fixed stub binary instead
/// of actually assembling anything.
#[derive(Default)]
pub struct FakeAssembler {
    pub stub: Vec<u8>,
    pub requests: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl FakeAssembler {
    pub fn new(stub: Vec<u8>) -> Self {
        FakeAssembler {
            stub,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl Assembler for FakeAssembler {
    fn assemble(&self, input_path: &Path, output_path: &Path) -> Result<(), LongError> {
        self.requests
            .borrow_mut()
            .push((input_path.to_path_buf(), output_path.to_path_buf()));
        std::fs::write(output_path, &self.stub)?;
        Ok(())
    }
}
