//! Integer materialization.
//!
//! The machine has no immediate operands: the only way to get a number onto
//! the data stack is to build it from the digit pushes `a`..`j` (0..9) and
//! arithmetic.  [integer] turns an arbitrary 32-bit value into a short
//! instruction sequence whose net effect is exactly one push.
//!
//! The general scheme is decimal: `n = (n / 10) * 10 + n % 10`, recursing on
//! the quotient.  In front of that sit special cases for single digits, for
//! 10 itself (`cfM`, i.e. 2 * 5), and a fixed table of values that occur
//! constantly as character codes in emitted programs (the lowercase letters
//! plus `_`, `!` and `-`).  The table entries are load-bearing: other parts
//! of the code generator assume these exact byte sequences, so they must not
//! be "improved" in place.
//!
//! Negative values become `0 <encoding of -n> S`, which the machine folds to
//! `0 - (-n)`; everything is modulo 2^32, so `i32::MIN` works out too.

/// Emit an instruction sequence that pushes `n`.
///
/// Pure and deterministic; the output uses only the characters
/// `a`-`j`, `A`, `S` and `M`.
pub fn integer(n: i32) -> String {
    enc(i64::from(n))
}

fn enc(num: i64) -> String {
    if num < 0 {
        return format!("a{}S", enc(-num));
    }
    if num < 10 {
        return digit(num);
    }
    if num == 10 {
        return "cfM".to_string();
    }

    match num {
        97 => "jjMjAhA".to_string(),  // 'a'
        98 => "jjMjAiA".to_string(),  // 'b'
        99 => "jjMjAjA".to_string(),  // 'c'
        100 => "cfMcfMM".to_string(), // 'd'
        101 => "cfMcfMMbA".to_string(),
        102 => "jiAcdMM".to_string(),
        103 => "jiAcdMMbA".to_string(),
        104 => "jeAiM".to_string(),
        105 => "hdfMM".to_string(),
        106 => "hdfMMbA".to_string(),
        107 => "hdfMMcA".to_string(),
        108 => "ggdMM".to_string(),
        109 => "ggdMMbA".to_string(),
        110 => "fgAfMcM".to_string(),
        111 => "fgAfMcMbA".to_string(),
        112 => "fgAfMcMcA".to_string(),
        113 => "fgAfMcMdA".to_string(),
        114 => "fgAfMcMeA".to_string(),
        115 => "fgAfMcMfA".to_string(),
        116 => "fgAfMcMgA".to_string(),
        117 => "fgAfMcMhA".to_string(),
        118 => "fgAfMcMiA".to_string(),
        119 => "fgAfMcMjA".to_string(), // 'w'
        120 => "gcfcMMM".to_string(),   // 'x'
        121 => "fgAfgAM".to_string(),   // 'y'
        122 => "fgAfgAMbA".to_string(), // 'z'
        95 => "gfdMMfA".to_string(),    // '_'
        33 => "fgAdM".to_string(),      // '!'
        45 => "fddMM".to_string(),      // '-'

        _ => {
            // n = (n / 10) * 10 + n % 10
            let mut ret = enc(num / 10);
            ret.push_str("cfMM");
            ret.push_str(&enc(num % 10));
            ret.push('A');
            ret
        }
    }
}

fn digit(num: i64) -> String {
    debug_assert!((0..10).contains(&num));
    char::from(b'a' + num as u8).to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::integer;
    use crate::back::vm::Machine;

    /// Run an encoding on the machine and return the entire final stack.
    fn eval(seq: &str) -> Vec<u32> {
        let mut m = Machine::new(seq.bytes().collect());
        m.run(&mut Vec::new()).expect("encodings never fault");
        m.into_stack()
    }

    #[test]
    fn digits() {
        assert_eq!(integer(0), "a");
        assert_eq!(integer(7), "h");
        assert_eq!(integer(9), "j");
        assert_eq!(integer(10), "cfM");
    }

    #[test]
    fn table_entries_evaluate_to_their_codepoints() {
        for c in ('a'..='z').chain(['_', '!', '-']) {
            assert_eq!(
                eval(&integer(c as i32)),
                vec![c as u32],
                "encoding of {:?}",
                c
            );
        }
    }

    #[test]
    fn negative_values() {
        assert_eq!(integer(-5), "afS");
        assert_eq!(eval("afS"), vec![(-5i32) as u32]);
        assert_eq!(eval(&integer(i32::MIN)), vec![i32::MIN as u32]);
    }

    #[test]
    fn alphabet_is_restricted() {
        for n in [-987_654, -42, -1, 0, 12, 345, 99_999, i32::MAX, i32::MIN] {
            for c in integer(n).chars() {
                assert!(
                    matches!(c, 'a'..='j' | 'A' | 'S' | 'M' | 'V'),
                    "unexpected {:?} in encoding of {}",
                    c,
                    n
                );
            }
        }
    }

    #[test]
    fn deterministic() {
        for n in [-300, 0, 7, 1234, 100_000] {
            assert_eq!(integer(n), integer(n));
        }
    }

    #[test]
    fn full_range_sweep() {
        for n in -10_000..=10_000 {
            let stack = eval(&integer(n));
            assert_eq!(stack, vec![n as u32], "encoding of {}", n);
        }
    }
}
