//! 题目分类 - 业务能力层
//!
//! 纯函数：对解答文本（小写后）逐个标签统计关键词命中次数，
//! 取得分最高的标签；没有任何命中时返回 "Genel"

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// 未命中任何规则时的标签
pub const FALLBACK_LABEL: &str = "Genel";

type SubtopicRules = (&'static str, &'static [&'static str]);

/// 标签 -> 子标签 -> 规则
///
/// 顺序即平分时的优先级
const TOPIC_TABLE: &[(&str, &[SubtopicRules])] = &[
    (
        "Matematik",
        &[
            ("Türev", &[r"türev", r"teğet", r"f'\(x\)", r"ekstremum"]),
            ("İntegral", &[r"integral", r"∫", r"ters türev"]),
            ("Limit", &[r"\blimit", r"\blim\b", r"süreklilik"]),
            ("Fonksiyonlar", &[r"fonksiyon", r"tanım kümesi", r"görüntü kümesi"]),
            ("Olasılık", &[r"olasılık", r"permütasyon", r"kombinasyon", r"\bzar\b"]),
            ("Geometri", &[r"üçgen", r"çember", r"dörtgen", r"\baçı(sı|ları|nın)?\b", r"hipotenüs"]),
            ("Denklemler", &[r"denklem", r"eşitsizlik", r"polinom", r"\bkök(ler)?\b"]),
            ("Logaritma", &[r"logaritma", r"\blog\b", r"\bln\b", r"üstel"]),
        ],
    ),
    (
        "Fizik",
        &[
            ("Hareket", &[r"\bhız", r"ivme", r"yer değiştirme", r"sürat", r"m/s"]),
            ("Kuvvet", &[r"kuvvet", r"newton", r"sürtünme", r"\bkütle"]),
            ("Enerji", &[r"kinetik", r"potansiyel enerji", r"joule", r"mekanik enerji"]),
            ("Elektrik", &[r"elektrik", r"\bakım", r"direnç", r"\bvolt", r"\bohm"]),
            ("Optik", &[r"ışık", r"mercek", r"\bayna", r"kırılma"]),
            ("Dalgalar", &[r"dalga", r"frekans", r"periyot"]),
        ],
    ),
    (
        "Kimya",
        &[
            ("Atom", &[r"\batom", r"elektron", r"proton", r"nötron", r"periyodik"]),
            ("Tepkimeler", &[r"tepkime", r"reaksiyon", r"\bmol\b", r"denkleştir"]),
            ("Asit-Baz", &[r"\basit", r"\bbaz\b", r"\bph\b", r"nötralleşme"]),
            ("Çözeltiler", &[r"çözelti", r"derişim", r"molarite", r"çözünürlük"]),
            ("Organik", &[r"organik", r"hidrokarbon", r"alkan", r"alken"]),
        ],
    ),
    (
        "Biyoloji",
        &[
            ("Hücre", &[r"hücre", r"mitokondri", r"organel", r"sitoplazma"]),
            ("Genetik", &[r"\bgen\b", r"genetik", r"\bdna\b", r"kromozom", r"\balel", r"kalıtım"]),
            ("Ekoloji", &[r"ekosistem", r"besin zinciri", r"popülasyon"]),
            ("Sistemler", &[r"sindirim", r"dolaşım", r"solunum", r"boşaltım", r"sinir sistemi"]),
        ],
    ),
    (
        "Türkçe",
        &[
            ("Dil Bilgisi", &[r"sözcük türü", r"\bfiil", r"\bzarf", r"\bsıfat", r"zamir"]),
            ("Anlam Bilgisi", &[r"paragraf", r"ana fikir", r"ana düşünce", r"anlatım biçimi"]),
            ("Yazım ve Noktalama", &[r"yazım yanlış", r"noktalama", r"imla"]),
        ],
    ),
    (
        "Tarih",
        &[
            ("Osmanlı", &[r"osmanlı", r"padişah", r"sadrazam", r"\bfetih"]),
            ("Cumhuriyet", &[r"atatürk", r"cumhuriyet", r"kurtuluş savaşı", r"inkılap"]),
            ("İlk Çağ", &[r"uygarlık", r"mezopotamya", r"hitit", r"\bantik"]),
        ],
    ),
    (
        "Coğrafya",
        &[
            ("İklim", &[r"iklim", r"yağış", r"rüzgar", r"basınç merkezi"]),
            ("Harita", &[r"harita", r"enlem", r"boylam", r"ölçek"]),
            ("Nüfus", &[r"nüfus", r"\bgöç", r"yerleşme"]),
            ("Yer Şekilleri", &[r"\bdağ", r"\bova", r"akarsu", r"plato"]),
        ],
    ),
    (
        "İngilizce",
        &[
            ("Grammar", &[r"\btense\b", r"present perfect", r"past simple", r"passive voice", r"\bverb\b"]),
            ("Vocabulary", &[r"vocabulary", r"synonym", r"closest in meaning"]),
            ("Reading", &[r"\bpassage\b", r"according to the (text|passage)"]),
        ],
    ),
];

struct Subtopic {
    name: &'static str,
    patterns: Vec<Regex>,
}

struct Topic {
    label: &'static str,
    subtopics: Vec<Subtopic>,
}

static TOPICS: LazyLock<Vec<Topic>> = LazyLock::new(compile_table);

fn compile_table() -> Vec<Topic> {
    TOPIC_TABLE
        .iter()
        .map(|(label, subtopics)| Topic {
            label,
            subtopics: subtopics
                .iter()
                .map(|(name, patterns)| Subtopic {
                    name,
                    patterns: patterns
                        .iter()
                        .filter_map(|p| match Regex::new(p) {
                            Ok(re) => Some(re),
                            Err(e) => {
                                warn!("分类规则编译失败 {}: {}", p, e);
                                None
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// 小写化；`İ` 小写后会多出组合点 U+0307，去掉以便与规则中的 `i` 匹配
fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{307}', "")
}

/// 对文本分类，返回 (标签, 子标签)
pub fn classify(text: &str) -> (&'static str, Option<&'static str>) {
    if text.trim().is_empty() {
        return (FALLBACK_LABEL, None);
    }
    let lower = normalize(text);

    let mut best: Option<(&'static str, Option<&'static str>, usize)> = None;
    for topic in TOPICS.iter() {
        let mut score = 0;
        let mut best_sub: Option<(&'static str, usize)> = None;
        for subtopic in &topic.subtopics {
            let hits: usize = subtopic
                .patterns
                .iter()
                .map(|re| re.find_iter(&lower).count())
                .sum();
            score += hits;
            if hits > 0 && best_sub.map_or(true, |(_, h)| hits > h) {
                best_sub = Some((subtopic.name, hits));
            }
        }
        // 严格大于：平分时保留表中靠前的标签
        if score > 0 && best.map_or(true, |(_, _, s)| score > s) {
            best = Some((topic.label, best_sub.map(|(name, _)| name), score));
        }
    }

    match best {
        Some((label, sublabel, _)) => (label, sublabel),
        None => (FALLBACK_LABEL, None),
    }
}

/// 分类回调接口
pub trait TopicClassifier: Send + Sync {
    fn classify(&self, text: &str) -> (String, Option<String>);
}

/// 基于关键词规则表的分类器
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl TopicClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> (String, Option<String>) {
        let (label, sublabel) = classify(text);
        (label.to_string(), sublabel.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_general() {
        assert_eq!(classify(""), (FALLBACK_LABEL, None));
        assert_eq!(classify("   \n"), (FALLBACK_LABEL, None));
    }

    #[test]
    fn test_unmatched_text_is_general() {
        assert_eq!(classify("Merhaba dünya"), (FALLBACK_LABEL, None));
    }

    #[test]
    fn test_calculus_keywords_pick_mathematics() {
        let text = "Önce fonksiyonun TÜREVİNİ alalım, sonra integral ile alanı bulalım.";
        let (label, sublabel) = classify(text);
        assert_eq!(label, "Matematik");
        assert!(sublabel.is_some());
    }

    #[test]
    fn test_sublabel_follows_dominant_subtopic() {
        let text = "Belirli integral hesabı: ∫ x dx. Integral sınırları 0 ve 1.";
        assert_eq!(classify(text), ("Matematik", Some("İntegral")));
    }

    #[test]
    fn test_sentence_initial_dotted_capital_i() {
        let text = "İntegral hesabı yapılır. İntegral sınırları 0 ve 1.";
        assert_eq!(classify(text), ("Matematik", Some("İntegral")));
        assert_eq!(normalize("İNTEGRAL"), "integral");
    }

    #[test]
    fn test_other_subjects() {
        assert_eq!(classify("Cismin ivme değeri ve hız grafiği").0, "Fizik");
        assert_eq!(classify("Hücre zarı ve mitokondri görevleri").0, "Biyoloji");
        assert_eq!(classify("Atatürk döneminde yapılan inkılap").0, "Tarih");
        assert_eq!(
            classify("Which word is closest in meaning to the verb in the passage?").0,
            "İngilizce"
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        // 数学与物理各命中一次，表中靠前者胜出
        let text = "türev ve ivme";
        let first = classify(text);
        for _ in 0..10 {
            assert_eq!(classify(text), first);
        }
        assert_eq!(first.0, "Matematik");
    }

    #[test]
    fn test_keyword_classifier_callback() {
        let classifier = KeywordClassifier;
        let (label, sublabel) = classifier.classify("mol sayısı ve tepkime denklemi");
        assert_eq!(label, "Kimya");
        assert_eq!(sublabel.as_deref(), Some("Tepkimeler"));
    }
}
