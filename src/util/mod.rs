pub mod env;
pub mod telemetry;

/// Compares two `&str` values in constant time so token checks don't leak
/// prefix-match information through response timing.
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();

    // xor-fold over every byte; black_box keeps the compiler from
    // short-circuiting on the first mismatch
    let mut res = 0u8;
    for i in 0..a.len() {
        let left = std::hint::black_box(a[i]);
        let right = std::hint::black_box(b[i]);
        res |= left ^ right;
    }

    std::hint::black_box(res) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_const_time_cmp() {
        let expects = "test_string";
        let passing = "test_string";

        let bad_start = "__st_string";
        let bad_end = "test_str___";

        let short = "test_strin";
        let long = "test_string_";

        assert!(constant_time_cmp(expects, passing));
        assert!(!constant_time_cmp(expects, bad_start));
        assert!(!constant_time_cmp(expects, bad_end));
        assert!(!constant_time_cmp(expects, short));
        assert!(!constant_time_cmp(expects, long));
    }
}
