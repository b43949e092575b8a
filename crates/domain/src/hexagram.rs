//! 六十四卦の乱数生成
//!
//! 0..=63 の整数を 6 本の爻に対応させる。ビット i が下から i 本目の爻で、1 が陽爻。
//! 下位 3 ビットが下卦、上位 3 ビットが上卦。卦名と番号は文王（通行本）の序による。

use crate::errors::DomainError;
use rand::Rng;
use std::fmt;

/// 卦の総数
pub const HEXAGRAM_COUNT: u8 = 64;

/// 文王序の番号。行が上卦、列が下卦（乾・震・坎・艮・坤・巽・离・兑 の順）
const KING_WEN: [[u8; 8]; 8] = [
    [1, 25, 6, 33, 12, 44, 13, 10],
    [34, 51, 40, 62, 16, 32, 55, 54],
    [5, 3, 29, 39, 8, 48, 63, 60],
    [26, 27, 4, 52, 23, 18, 22, 41],
    [11, 24, 7, 15, 2, 46, 36, 19],
    [9, 42, 59, 53, 20, 57, 37, 61],
    [14, 21, 64, 56, 35, 50, 30, 38],
    [43, 17, 47, 31, 45, 28, 49, 58],
];

/// 番号順の卦名
const NAMES: [&str; 64] = [
    "乾", "坤", "屯", "蒙", "需", "讼", "师", "比", "小畜", "履", "泰", "否", "同人", "大有",
    "谦", "豫", "随", "蛊", "临", "观", "噬嗑", "贲", "剥", "复", "无妄", "大畜", "颐", "大过",
    "坎", "离", "咸", "恒", "遁", "大壮", "晋", "明夷", "家人", "睽", "蹇", "解", "损", "益",
    "夬", "姤", "萃", "升", "困", "井", "革", "鼎", "震", "艮", "渐", "归妹", "丰", "旅", "巽",
    "兑", "涣", "节", "中孚", "小过", "既济", "未济",
];

/// 閉区間 `[min, max]` の整数を返す。上下が逆なら入れ替える
pub fn random_in_range<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> i64 {
    let (low, high) = if min > max { (max, min) } else { (min, max) };
    rng.gen_range(low..=high)
}

/// ゼロ埋めした 2 進文字列。`width` を超える値は切り詰めない
pub fn to_binary_string(value: u64, width: usize) -> String {
    format!("{:0width$b}", value, width = width)
}

/// 爻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Yin,
    Yang,
}

impl Line {
    fn from_bit(bit: u8) -> Self {
        if bit & 1 == 1 {
            Line::Yang
        } else {
            Line::Yin
        }
    }
}

/// 八卦
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigram {
    Qian,
    Dui,
    Li,
    Zhen,
    Xun,
    Kan,
    Gen,
    Kun,
}

impl Trigram {
    /// 下から順の 3 ビット（bit0 が最下爻）
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b111 => Trigram::Qian,
            0b011 => Trigram::Dui,
            0b101 => Trigram::Li,
            0b001 => Trigram::Zhen,
            0b110 => Trigram::Xun,
            0b010 => Trigram::Kan,
            0b100 => Trigram::Gen,
            _ => Trigram::Kun,
        }
    }

    fn table_index(self) -> usize {
        match self {
            Trigram::Qian => 0,
            Trigram::Zhen => 1,
            Trigram::Kan => 2,
            Trigram::Gen => 3,
            Trigram::Kun => 4,
            Trigram::Xun => 5,
            Trigram::Li => 6,
            Trigram::Dui => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Trigram::Qian => "乾",
            Trigram::Dui => "兑",
            Trigram::Li => "离",
            Trigram::Zhen => "震",
            Trigram::Xun => "巽",
            Trigram::Kan => "坎",
            Trigram::Gen => "艮",
            Trigram::Kun => "坤",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Trigram::Qian => '☰',
            Trigram::Dui => '☱',
            Trigram::Li => '☲',
            Trigram::Zhen => '☳',
            Trigram::Xun => '☴',
            Trigram::Kan => '☵',
            Trigram::Gen => '☶',
            Trigram::Kun => '☷',
        }
    }
}

impl fmt::Display for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.symbol())
    }
}

/// 卦
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hexagram {
    value: u8,
}

impl Hexagram {
    pub fn from_value(value: u8) -> Result<Self, DomainError> {
        if value >= HEXAGRAM_COUNT {
            return Err(DomainError::InvalidHexagram(value));
        }
        Ok(Self { value })
    }

    /// 一様乱数で卦を立てる
    pub fn cast<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value = random_in_range(rng, 0, i64::from(HEXAGRAM_COUNT) - 1);
        Self { value: value as u8 }
    }

    /// 文王序の番号（1..=64）
    pub fn number(&self) -> u8 {
        KING_WEN[self.upper().table_index()][self.lower().table_index()]
    }

    pub fn name(&self) -> &'static str {
        NAMES[usize::from(self.number() - 1)]
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// 上爻を先頭にした 6 桁の 2 進表記
    pub fn binary(&self) -> String {
        to_binary_string(u64::from(self.value), 6)
    }

    /// 初爻（最下）から上爻の順
    pub fn lines(&self) -> [Line; 6] {
        let mut lines = [Line::Yin; 6];
        for (index, line) in lines.iter_mut().enumerate() {
            *line = Line::from_bit(self.value >> index);
        }
        lines
    }

    pub fn lower(&self) -> Trigram {
        Trigram::from_bits(self.value)
    }

    pub fn upper(&self) -> Trigram {
        Trigram::from_bits(self.value >> 3)
    }
}

impl fmt::Display for Hexagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "第{}卦 {} {} 上卦 {} / 下卦 {}",
            self.number(),
            self.name(),
            self.binary(),
            self.upper(),
            self.lower()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn binary_string_is_zero_padded() {
        assert_eq!(to_binary_string(5, 6), "000101");
        assert_eq!(to_binary_string(0, 6), "000000");
        assert_eq!(to_binary_string(64, 6), "1000000");
    }

    #[test]
    fn random_in_range_swaps_reversed_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let value = random_in_range(&mut rng, 10, 3);
            assert!((3..=10).contains(&value));
        }
        assert_eq!(random_in_range(&mut rng, 4, 4), 4);
    }

    #[test]
    fn pure_yang_and_pure_yin() {
        let qian = Hexagram::from_value(63).unwrap();
        assert!(qian.lines().iter().all(|line| *line == Line::Yang));
        assert_eq!(qian.upper(), Trigram::Qian);
        assert_eq!(qian.lower(), Trigram::Qian);

        let kun = Hexagram::from_value(0).unwrap();
        assert_eq!(kun.binary(), "000000");
        assert_eq!(kun.upper(), Trigram::Kun);
    }

    #[test]
    fn bottom_line_is_lowest_bit() {
        let hexagram = Hexagram::from_value(0b000_001).unwrap();
        assert_eq!(hexagram.lines()[0], Line::Yang);
        assert_eq!(hexagram.lines()[5], Line::Yin);
        assert_eq!(hexagram.lower(), Trigram::Zhen);
        assert_eq!(hexagram.upper(), Trigram::Kun);
        assert_eq!(hexagram.binary(), "000001");
    }

    #[test]
    fn water_over_heaven() {
        // 上卦 坎、下卦 乾
        let hexagram = Hexagram::from_value(0b010_111).unwrap();
        assert_eq!(hexagram.upper(), Trigram::Kan);
        assert_eq!(hexagram.lower(), Trigram::Qian);
        assert_eq!(hexagram.number(), 5);
        assert_eq!(hexagram.name(), "需");
        assert_eq!(hexagram.to_string(), "第5卦 需 010111 上卦 坎☵ / 下卦 乾☰");
    }

    #[test]
    fn king_wen_numbers_and_names() {
        let cases = [
            (0b111_111, 1, "乾"),
            (0b000_000, 2, "坤"),
            (0b000_111, 11, "泰"),
            (0b111_000, 12, "否"),
            (0b010_101, 63, "既济"),
            (0b101_010, 64, "未济"),
            (0b011_110, 28, "大过"),
        ];
        for (value, number, name) in cases {
            let hexagram = Hexagram::from_value(value).unwrap();
            assert_eq!(hexagram.number(), number, "value {:06b}", value);
            assert_eq!(hexagram.name(), name);
        }
    }

    #[test]
    fn every_number_appears_once() {
        let mut seen = [false; 64];
        for value in 0..HEXAGRAM_COUNT {
            let number = Hexagram::from_value(value).unwrap().number();
            assert!((1..=64).contains(&number));
            assert!(!seen[usize::from(number - 1)], "duplicate {}", number);
            seen[usize::from(number - 1)] = true;
        }
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert_eq!(
            Hexagram::from_value(64).unwrap_err(),
            DomainError::InvalidHexagram(64)
        );
    }

    #[test]
    fn cast_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; 64];
        for _ in 0..2000 {
            let value = Hexagram::cast(&mut rng).value();
            assert!(value < HEXAGRAM_COUNT);
            seen[usize::from(value)] = true;
        }
        // 両端も出る
        assert!(seen[0] && seen[63]);
    }
}
