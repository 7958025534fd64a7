use serde::Deserialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Display languages a report can be produced in.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(from = "String")]
pub enum LanguageCode {
    Es,
    #[default]
    En,
    Pt,
    Fr,
    De,
    Zh,
    Ja,
    Ru,
    Ar,
    Hi,
}

impl From<String> for LanguageCode {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

/// Every label the report prints.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalizedStrings {
    pub header: &'static str,
    pub date: &'static str,
    pub problem_context: &'static str,
    pub student_inputs: &'static str,
    pub attempt: &'static str,
    pub question: &'static str,
    pub transcript: &'static str,
    pub student: &'static str,
    pub tutor: &'static str,
    pub video_submitted: &'static str,
    pub audio_submitted: &'static str,
    pub audio_question: &'static str,
    pub image_error: &'static str,
    pub chart_error: &'static str,
    pub page: &'static str,
    pub of: &'static str,
}

impl LanguageCode {
    /// Parses a language code, falling back to the default language for
    /// anything unknown.
    pub fn from_code(code: &str) -> Self {
        code.trim().to_lowercase().parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown language code {:?}, using {}", code, Self::default());
            Self::default()
        })
    }

    pub fn strings(self) -> &'static LocalizedStrings {
        match self {
            LanguageCode::Es => &ES,
            LanguageCode::En => &EN,
            LanguageCode::Pt => &PT,
            LanguageCode::Fr => &FR,
            LanguageCode::De => &DE,
            LanguageCode::Zh => &ZH,
            LanguageCode::Ja => &JA,
            LanguageCode::Ru => &RU,
            LanguageCode::Ar => &AR,
            LanguageCode::Hi => &HI,
        }
    }
}

impl LocalizedStrings {
    pub fn page_label(&self, page: usize, total: usize) -> String {
        format!("{} {page} {} {total}", self.page, self.of)
    }
}

static ES: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Reporte de Sesión",
    date: "Fecha:",
    problem_context: "1. Contexto del Problema",
    student_inputs: "2. Entradas del Estudiante",
    attempt: "Intento de Solución:",
    question: "Pregunta:",
    transcript: "3. Transcripción de la Sesión",
    student: "Estudiante:",
    tutor: "Tutor PrismAI:",
    video_submitted: "[Archivo de Video Enviado]",
    audio_submitted: "[Archivo de Audio Enviado]",
    audio_question: "[Pregunta de Audio Enviada]",
    image_error: "[Error cargando imagen]",
    chart_error: "[Error generando gráfico]",
    page: "Página",
    of: "de",
};

static EN: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Session Report",
    date: "Date:",
    problem_context: "1. Problem Context",
    student_inputs: "2. Student Inputs",
    attempt: "Solution Attempt:",
    question: "Question:",
    transcript: "3. Session Transcript",
    student: "Student:",
    tutor: "PrismAI Tutor:",
    video_submitted: "[Video File Submitted]",
    audio_submitted: "[Audio File Submitted]",
    audio_question: "[Audio Question Submitted]",
    image_error: "[Error loading image]",
    chart_error: "[Chart Generation Failed]",
    page: "Page",
    of: "of",
};

static PT: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Relatório da Sessão",
    date: "Data:",
    problem_context: "1. Contexto do Problema",
    student_inputs: "2. Entradas do Estudante",
    attempt: "Tentativa de Solução:",
    question: "Pergunta:",
    transcript: "3. Transcrição da Sessão",
    student: "Estudante:",
    tutor: "Tutor PrismAI:",
    video_submitted: "[Arquivo de Vídeo Enviado]",
    audio_submitted: "[Arquivo de Áudio Enviado]",
    audio_question: "[Pergunta de Áudio Enviada]",
    image_error: "[Erro ao carregar imagem]",
    chart_error: "[Erro ao gerar gráfico]",
    page: "Página",
    of: "de",
};

static FR: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Rapport de Session",
    date: "Date :",
    problem_context: "1. Contexte du Problème",
    student_inputs: "2. Entrées de l'Étudiant",
    attempt: "Tentative de Solution :",
    question: "Question :",
    transcript: "3. Transcription de la Session",
    student: "Étudiant :",
    tutor: "Tuteur PrismAI :",
    video_submitted: "[Fichier Vidéo Soumis]",
    audio_submitted: "[Fichier Audio Soumis]",
    audio_question: "[Question Audio Soumise]",
    image_error: "[Erreur de chargement d'image]",
    chart_error: "[Échec de génération du graphique]",
    page: "Page",
    of: "sur",
};

static DE: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Sitzungsbericht",
    date: "Datum:",
    problem_context: "1. Problemkontext",
    student_inputs: "2. Eingaben des Studenten",
    attempt: "Lösungsversuch:",
    question: "Frage:",
    transcript: "3. Sitzungsprotokoll",
    student: "Student:",
    tutor: "PrismAI Tutor:",
    video_submitted: "[Videodatei gesendet]",
    audio_submitted: "[Audiodatei gesendet]",
    audio_question: "[Audiofrage gesendet]",
    image_error: "[Fehler beim Laden des Bildes]",
    chart_error: "[Diagrammerstellung fehlgeschlagen]",
    page: "Seite",
    of: "von",
};

static ZH: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - 会话报告",
    date: "日期:",
    problem_context: "1. 问题背景",
    student_inputs: "2. 学生输入",
    attempt: "尝试解决方案:",
    question: "问题:",
    transcript: "3. 会话记录",
    student: "学生:",
    tutor: "PrismAI 导师:",
    video_submitted: "[已提交视频文件]",
    audio_submitted: "[已提交音频文件]",
    audio_question: "[已提交音频问题]",
    image_error: "[加载图片错误]",
    chart_error: "[图表生成失败]",
    page: "页",
    of: "共",
};

static JA: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - セッションレポート",
    date: "日付:",
    problem_context: "1. 問題の背景",
    student_inputs: "2. 学生の入力",
    attempt: "解決の試み:",
    question: "質問:",
    transcript: "3. セッション記録",
    student: "学生:",
    tutor: "PrismAI チューター:",
    video_submitted: "[ビデオファイル提出済み]",
    audio_submitted: "[音声ファイル提出済み]",
    audio_question: "[音声質問提出済み]",
    image_error: "[画像読み込みエラー]",
    chart_error: "[チャート生成失敗]",
    page: "ページ",
    of: "/",
};

static RU: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - Отчет о сессии",
    date: "Дата:",
    problem_context: "1. Контекст проблемы",
    student_inputs: "2. Ввод студента",
    attempt: "Попытка решения:",
    question: "Вопрос:",
    transcript: "3. Стенограмма сессии",
    student: "Студент:",
    tutor: "Тьютор PrismAI:",
    video_submitted: "[Видео отправлено]",
    audio_submitted: "[Аудио отправлено]",
    audio_question: "[Аудио-вопрос отправлен]",
    image_error: "[Ошибка загрузки изображения]",
    chart_error: "[Ошибка генерации графика]",
    page: "Страница",
    of: "из",
};

static AR: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - تقرير الجلسة",
    date: "التاريخ:",
    problem_context: "1. سياق المشكلة",
    student_inputs: "2. مدخلات الطالب",
    attempt: "محاولة الحل:",
    question: "السؤال:",
    transcript: "3. نص الجلسة",
    student: "الطالب:",
    tutor: "المعلم PrismAI:",
    video_submitted: "[تم إرسال ملف الفيديو]",
    audio_submitted: "[تم إرسال ملف الصوت]",
    audio_question: "[تم إرسال سؤال صوتي]",
    image_error: "[خطأ في تحميل الصورة]",
    chart_error: "[فشل إنشاء المخطط]",
    page: "صفحة",
    of: "من",
};

static HI: LocalizedStrings = LocalizedStrings {
    header: "PrismAI Learn - सत्र रिपोर्ट",
    date: "दिनांक:",
    problem_context: "1. समस्या संदर्भ",
    student_inputs: "2. छात्र इनपुट",
    attempt: "समाधान का प्रयास:",
    question: "प्रश्न:",
    transcript: "3. सत्र प्रतिलेख",
    student: "छात्र:",
    tutor: "PrismAI ट्यूटर:",
    video_submitted: "[वीडियो फ़ाइल प्रस्तुत की गई]",
    audio_submitted: "[ऑडियो फ़ाइल प्रस्तुत की गई]",
    audio_question: "[ऑडियो प्रश्न प्रस्तुत किया गया]",
    image_error: "[छवि लोड करने में त्रुटि]",
    chart_error: "[चार्ट निर्माण विफल]",
    page: "पृष्ठ",
    of: "का",
};

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!(LanguageCode::from_code("fr"), LanguageCode::Fr);
        assert_eq!(LanguageCode::from_code(" JA "), LanguageCode::Ja);
        assert_eq!(LanguageCode::Pt.to_string(), "pt");
        assert_eq!(LanguageCode::iter().count(), 10);
    }

    #[test]
    fn test_unknown_code_falls_back_entirely() {
        let fallback = LanguageCode::from_code("xx");
        assert_eq!(fallback, LanguageCode::En);
        assert!(std::ptr::eq(fallback.strings(), LanguageCode::En.strings()));
    }

    #[test]
    fn test_deserialize_falls_back_on_unknown_code() {
        let parse = |json: &str| serde_json::from_str::<LanguageCode>(json).unwrap();
        assert_eq!(parse(r#""de""#), LanguageCode::De);
        assert_eq!(parse(r#"" ES ""#), LanguageCode::Es);
        assert_eq!(parse(r#""xx""#), LanguageCode::En);
    }

    #[test]
    fn test_every_language_is_complete() {
        for code in LanguageCode::iter() {
            let s = code.strings();
            let labels = [
                s.header,
                s.date,
                s.problem_context,
                s.student_inputs,
                s.attempt,
                s.question,
                s.transcript,
                s.student,
                s.tutor,
                s.video_submitted,
                s.audio_submitted,
                s.audio_question,
                s.image_error,
                s.chart_error,
                s.page,
                s.of,
            ];
            assert!(labels.iter().all(|l| !l.trim().is_empty()), "{code}");
        }
    }

    #[test]
    fn test_page_label() {
        assert_eq!(EN.page_label(2, 5), "Page 2 of 5");
        assert_eq!(DE.page_label(1, 3), "Seite 1 von 3");
    }
}
