//! 字节数格式化（二进制单位）

const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// 将字节数转换为易读格式，例如 `"512 B"`、`"1.0 KB"`、`"-3.5 MB"`
///
/// 单位按 1024 递进，保留一位小数（四舍五入），符号保持不变。
/// 对任意 `i64` 输入（包括 `i64::MIN`）都不会 panic。
pub fn format_bytes(bytes: i64) -> String {
    let abs = bytes.unsigned_abs();
    if abs < 1024 {
        return format!("{} B", bytes);
    }

    // 选择最大的单位，使换算后的值四舍五入后仍小于 1024.0
    let mut value = abs;
    let mut unit = 0;
    let mut shift = 40i32;
    while shift >= 0 && abs > (0x0fff_cccc_cccc_ccccu64 >> shift) {
        value >>= 10;
        unit += 1;
        shift -= 10;
    }

    // value / 1024 保留一位小数，四舍五入
    let tenths = (value * 10 + 512) / 1024;
    let sign = if bytes < 0 { "-" } else { "" };
    format!("{}{}.{} {}B", sign, tenths / 10, tenths % 10, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_are_plain_bytes() {
        for b in [0i64, 1, 512, 1023, -1, -1023] {
            assert_eq!(format_bytes(b), format!("{} B", b));
        }
    }

    #[test]
    fn test_unit_boundaries() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
        assert_eq!(format_bytes(5 * 1024_i64.pow(4)), "5.0 TB");
        assert_eq!(format_bytes(1024_i64.pow(5)), "1.0 PB");
        assert_eq!(format_bytes(2 * 1024_i64.pow(6)), "2.0 EB");
    }

    #[test]
    fn test_just_below_next_unit_rolls_over() {
        // 1048575 B ≈ 1023.999 KB，四舍五入后会显示成 1024.0 KB，因此升到 MB
        assert_eq!(format_bytes(1024 * 1024 - 1), "1.0 MB");
        assert_eq!(format_bytes(1000 * 1024), "1000.0 KB");
    }

    #[test]
    fn test_sign_preserved() {
        assert_eq!(format_bytes(-1024), "-1.0 KB");
        assert_eq!(format_bytes(-3 * 1024 * 1024 / 2), "-1.5 MB");
    }

    #[test]
    fn test_extremes_do_not_panic() {
        assert_eq!(format_bytes(i64::MAX), "8.0 EB");
        assert_eq!(format_bytes(i64::MIN), "-8.0 EB");
    }
}
