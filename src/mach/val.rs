/// ## A single machine cell
///
/// Every register, stack slot and data cell holds 32 bits which are
/// read as an integer or a real depending on the instruction.

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Val(u32);

impl Val {
    pub fn from_int(i: i32) -> Val {
        Val(i as u32)
    }

    pub fn from_real(r: f32) -> Val {
        Val(r.to_bits())
    }

    pub fn from_bits(bits: u32) -> Val {
        Val(bits)
    }

    pub fn int(self) -> i32 {
        self.0 as i32
    }

    pub fn real(self) -> f32 {
        f32::from_bits(self.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Val({})", self.int())
    }
}

impl From<i32> for Val {
    fn from(i: i32) -> Self {
        Val::from_int(i)
    }
}

impl From<f32> for Val {
    fn from(r: f32) -> Self {
        Val::from_real(r)
    }
}

/// Formats a real with six significant digits, dropping trailing zeros.
pub fn real_to_string(r: f32) -> String {
    if r.is_nan() {
        return "nan".to_string();
    }
    if r.is_infinite() {
        return if r < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if r == 0.0 {
        return "0".to_string();
    }
    let r = r as f64;
    let exponent = r.abs().log10().floor() as i32;
    if exponent < -5 || exponent >= 6 {
        let s = format!("{:.5e}", r);
        let (mantissa, exp) = match s.split_once('e') {
            Some(parts) => parts,
            None => return s,
        };
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, r)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits() {
        assert_eq!(Val::from_int(-1).int(), -1);
        assert_eq!(Val::from_real(1.5).real(), 1.5);
        assert_eq!(Val::default().int(), 0);
    }

    #[test]
    fn test_real_to_string() {
        assert_eq!(real_to_string(0.5), "0.5");
        assert_eq!(real_to_string(3.0), "3");
        assert_eq!(real_to_string(-2.25), "-2.25");
        assert_eq!(real_to_string(std::f32::consts::PI), "3.14159");
        assert_eq!(real_to_string(0.1), "0.1");
        assert_eq!(real_to_string(1e7), "1e+07");
        assert_eq!(real_to_string(0.000001), "1e-06");
    }
}
