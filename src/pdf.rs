use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use crate::brag::{day_heading, BragDocument};
use crate::error::AppError;
use crate::nlu::normalize;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 20.0;
const FOOTER_Y: f32 = 10.0;
const PT_TO_MM: f32 = 0.3528;
/// Largura média de um glifo da Helvetica, em fração do tamanho da fonte.
const AVG_GLYPH: f32 = 0.5;

const TITLE_SIZE: f32 = 20.0;
const HEADER_SIZE: f32 = 11.0;
const DAY_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 11.0;

/// Renderiza o Brag Document em PDF (A4, fontes embutidas).
pub fn render_pdf(doc: &BragDocument) -> Result<Vec<u8>, AppError> {
    let title = format!("Brag Document - {}", doc.user_name);
    let (pdf, page, layer) = PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "conteudo");
    let regular = pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;
    let layer = pdf.get_page(page).get_layer(layer);

    let mut writer = PageWriter {
        pdf,
        layer,
        regular,
        bold,
        y: PAGE_H - MARGIN,
        page_no: 1,
    };
    writer.footer();

    writer.text("Brag Document", TITLE_SIZE, true);
    writer.space(2.0);
    writer.text(&doc.user_name, HEADER_SIZE + 2.0, false);
    writer.text(&format!("Período: {}", doc.period_label()), HEADER_SIZE, false);
    writer.text(
        &format!("Gerado em {}", doc.generated_at.format("%d/%m/%Y %H:%M")),
        HEADER_SIZE - 2.0,
        false,
    );
    writer.space(3.0);
    writer.rule();
    writer.space(6.0);

    if doc.is_empty() {
        writer.paragraph(&doc.empty_message(), BODY_SIZE, "");
    }

    for day in &doc.days {
        // cabeçalho do dia não fica sozinho no fim da página
        writer.ensure(line_height(DAY_SIZE) + 2.0 * line_height(BODY_SIZE));
        writer.text(&day_heading(day.date), DAY_SIZE, true);
        writer.space(1.0);
        for item in &day.items {
            let bullet = format!("- {}  ", item.time.format("%H:%M"));
            writer.paragraph(&item.content, BODY_SIZE, &bullet);
        }
        writer.space(4.0);
    }

    if !doc.is_empty() {
        writer.rule();
        writer.space(5.0);
        writer.text(&format!("Total: {} atividade(s)", doc.total()), BODY_SIZE, true);
    }

    writer.pdf.save_to_bytes().map_err(pdf_err)
}

/// `brag-ana-souza-20260310.pdf`
pub fn file_name(doc: &BragDocument) -> String {
    let slug = normalize(&doc.user_name).replace(' ', "-");
    let slug = if slug.is_empty() { "usuario".to_string() } else { slug };
    format!("brag-{}-{}.pdf", slug, doc.generated_at.format("%Y%m%d"))
}

fn pdf_err(e: printpdf::Error) -> AppError {
    AppError::Pdf(e.to_string())
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.45
}

fn max_chars(size: f32, width: f32) -> usize {
    ((width / (size * AVG_GLYPH * PT_TO_MM)).floor() as usize).max(10)
}

struct PageWriter {
    pdf: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    page_no: u32,
}

impl PageWriter {
    fn ensure(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        let (page, layer) = self.pdf.add_page(Mm(PAGE_W), Mm(PAGE_H), "conteudo");
        self.layer = self.pdf.get_page(page).get_layer(layer);
        self.y = PAGE_H - MARGIN;
        self.page_no += 1;
        self.footer();
    }

    fn footer(&self) {
        let label = format!("Bragfy - página {}", self.page_no);
        self.layer
            .use_text(label, 8.0, Mm(MARGIN), Mm(FOOTER_Y), &self.regular);
    }

    fn space(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        let height = line_height(size);
        self.ensure(height);
        self.y -= height;
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(pdf_safe(text), size, Mm(MARGIN), Mm(self.y), font);
    }

    /// Texto com quebra de linha; linhas seguintes alinham após o marcador.
    fn paragraph(&mut self, text: &str, size: f32, bullet: &str) {
        let indent = bullet.chars().count() as f32 * size * AVG_GLYPH * PT_TO_MM;
        let width = PAGE_W - 2.0 * MARGIN - indent;
        let lines = wrap_text(&pdf_safe(text), max_chars(size, width));
        let height = line_height(size);

        for (i, line) in lines.iter().enumerate() {
            self.ensure(height);
            self.y -= height;
            if i == 0 && !bullet.is_empty() {
                self.layer
                    .use_text(bullet, size, Mm(MARGIN), Mm(self.y), &self.bold);
            }
            self.layer
                .use_text(line.as_str(), size, Mm(MARGIN + indent), Mm(self.y), &self.regular);
        }
    }

    fn rule(&mut self) {
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(PAGE_W - MARGIN), Mm(self.y)), false),
            ],
            is_closed: false,
        };
        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(line);
    }
}

/// Greedy word wrap; palavras maiores que a linha são cortadas.
pub fn wrap_text(text: &str, max: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max).collect();
            word = word.chars().skip(max).collect();
            lines.push(head);
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// As fontes embutidas usam Windows-1252: o resto (emoji etc.) some.
pub fn pdf_safe(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{2014}' | '\u{2013}' => Some('-'),
            '\u{2022}' => Some('-'),
            '\u{201c}' | '\u{201d}' => Some('"'),
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\n' | '\t' => Some(' '),
            c if (c as u32) < 0x20 => None,
            c if (c as u32) <= 0xff => Some(c),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
