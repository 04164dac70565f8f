use std::sync::Arc;

use crate::ckks::{Ciphertext, CkksParameters, ExecutionOptions, RelinearizationKey};
use crate::Result;

use super::ArithmeticOperator;

/// Boolean gates over ciphertexts encrypting bits, i.e. values close to 0
/// or 1 in every slot.
#[derive(Debug, Clone)]
pub struct LogicOperator {
    arithmetic: ArithmeticOperator,
}

impl LogicOperator {
    /// Create an operator with the default execution options.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self {
            arithmetic: ArithmeticOperator::new(par),
        }
    }

    /// Create an operator with the given execution options.
    pub fn with_options(par: &Arc<CkksParameters>, options: ExecutionOptions) -> Self {
        Self {
            arithmetic: ArithmeticOperator::with_options(par, options),
        }
    }

    /// Returns 1 - x. Consumes no level.
    pub fn not(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = self.arithmetic.negate(ct)?;
        self.arithmetic.add_constant_inplace(&mut out, 1.0)?;
        Ok(out)
    }

    /// Returns a + b - 2ab. Consumes one level.
    pub fn xor(
        &self,
        lhs: &Ciphertext,
        rhs: &Ciphertext,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        let product = self.arithmetic.multiply_relinearize_rescale(lhs, rhs, rk)?;
        let sum = self.arithmetic.add(lhs, rhs)?;
        let mut out = self.arithmetic.rescale_to(&sum, product.scale)?;
        let twice = self.arithmetic.multiply_by_integer(&product, 2)?;
        self.arithmetic.sub_inplace(&mut out, &twice)?;
        Ok(out)
    }

    /// Returns 1 - (a + b - 2ab). Consumes one level.
    pub fn xnor(
        &self,
        lhs: &Ciphertext,
        rhs: &Ciphertext,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        self.not(&self.xor(lhs, rhs, rk)?)
    }
}

#[cfg(test)]
mod tests {
    use super::LogicOperator;
    use crate::ckks::{Ciphertext, CkksParameters, Decryptor, Encoder, Encryptor, KeyGenerator};
    use std::error::Error as StdError;

    #[test]
    fn gates() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(3, 32);
        let mut keygen = KeyGenerator::new(&par);
        let sk = keygen.generate_secret_key(0)?;
        let rk = keygen.generate_relin_key(&sk)?;
        let encoder = Encoder::new(&par);
        let mut encryptor = Encryptor::with_secret_key(&sk)?;
        let decryptor = Decryptor::new(&sk)?;
        let op = LogicOperator::new(&par);

        let a = (0..par.slots()).map(|i| (i % 2) as f64).collect::<Vec<_>>();
        let b = (0..par.slots()).map(|i| ((i / 2) % 2) as f64).collect::<Vec<_>>();
        let ct_a = encryptor.encrypt(&encoder.encode(&a, par.scale(), 0)?)?;
        let ct_b = encryptor.encrypt(&encoder.encode(&b, par.scale(), 0)?)?;

        let decrypt = |ct: &Ciphertext| -> Result<Vec<f64>, Box<dyn StdError>> {
            Ok(encoder.decode(&decryptor.decrypt(ct)?)?)
        };

        let not = decrypt(&op.not(&ct_a)?)?;
        let xor = op.xor(&ct_a, &ct_b, &rk)?;
        assert_eq!(xor.level(), 1);
        let xor = decrypt(&xor)?;
        let xnor = decrypt(&op.xnor(&ct_a, &ct_b, &rk)?)?;
        for i in 0..par.slots() {
            let (x, y) = (a[i] as u8, b[i] as u8);
            assert!((not[i] - (1 - x) as f64).abs() < 1e-5);
            assert!((xor[i] - (x ^ y) as f64).abs() < 1e-5);
            assert!((xnor[i] - (1 - (x ^ y)) as f64).abs() < 1e-5);
        }
        Ok(())
    }
}
