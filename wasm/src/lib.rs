use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use engine::{
    square_color, sprite_key, Activation, BoardController, BoardTheme, Piece, PieceColor,
    PieceKind, PieceVisual, SpriteSet, Square,
};
use rules::RulesError;

/// 렌더러 쪽 3D 씬에서 기물을 칸 위로 띄우는 높이
const PIECE_ELEVATION: f32 = 0.05;

/// JS에서 넘겨주는 보드 옵션 (모든 필드 생략 가능)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BoardOptions {
    pub light: Option<String>,
    pub dark: Option<String>,
    pub highlight: Option<String>,
    pub sprite_base: Option<String>,
    pub sprite_extension: Option<String>,
    pub promotion: Option<String>,
}

impl BoardOptions {
    /// 기본 테마 위에 지정된 값만 덮어씀
    pub fn theme(&self) -> BoardTheme {
        let mut theme = BoardTheme::default();
        if let Some(light) = &self.light {
            theme.light = light.clone();
        }
        if let Some(dark) = &self.dark {
            theme.dark = dark.clone();
        }
        if let Some(highlight) = &self.highlight {
            theme.highlight = highlight.clone();
        }
        if let Some(base) = &self.sprite_base {
            theme.sprite_base = base.clone();
        }
        if let Some(extension) = &self.sprite_extension {
            theme.sprite_extension = extension.clone();
        }
        theme
    }

    pub fn promotion(&self) -> Result<Option<PieceKind>, RulesError> {
        match &self.promotion {
            None => Ok(None),
            Some(name) => parse_piece(name).map(Some),
        }
    }
}

/// JS로 전달할 기물 정보
#[derive(Debug, Serialize, Deserialize)]
pub struct JsPiece {
    pub kind: String,
    pub color: String,
    pub key: String,
    /// 스프라이트 로드에 실패한 키면 None
    pub sprite: Option<String>,
    pub glyph: String,
    pub position: [f32; 3],
}

/// JS로 전달할 칸 정보
#[derive(Debug, Serialize, Deserialize)]
pub struct JsCell {
    pub x: i32,
    pub y: i32,
    pub square: String,
    pub fill: String,
    pub highlighted: bool,
    pub selected: bool,
    pub center: [f32; 3],
    pub piece: Option<JsPiece>,
}

/// JS로 전달할 한 프레임 분량의 보드 상태
#[derive(Debug, Serialize, Deserialize)]
pub struct JsFrame {
    pub cells: Vec<JsCell>,
    pub fen: String,
    pub turn: String,
    pub selected: Option<String>,
    pub check: bool,
    pub game_over: bool,
    pub winner: Option<u8>,
}

/// JS에서 사용할 보드 래퍼
#[wasm_bindgen]
pub struct Board {
    controller: BoardController,
    theme: BoardTheme,
    sprites: SpriteSet,
}

#[wasm_bindgen]
impl Board {
    /// 초기 배치로 보드 생성. `options`는 undefined/null 가능
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<Board, JsValue> {
        Self::build(BoardController::new(), options)
    }

    /// FEN 국면으로 보드 생성
    #[wasm_bindgen]
    pub fn from_fen(fen: &str, options: JsValue) -> Result<Board, JsValue> {
        let controller = BoardController::from_fen(fen).map_err(to_js_error)?;
        Self::build(controller, options)
    }

    /// 칸 클릭. "moved" | "rejected" | "selected" | "cleared"
    #[wasm_bindgen]
    pub fn on_square_activated(&mut self, x: i32, y: i32) -> Result<String, JsValue> {
        let square = board_square(x, y)?;
        Ok(self.activate(square).kind().to_string())
    }

    /// 이동 가능 칸인지
    #[wasm_bindgen]
    pub fn is_highlighted(&self, x: i32, y: i32) -> bool {
        Square::new(x, y).is_some_and(|square| self.controller.is_highlighted(square))
    }

    /// 체크무늬 칸 색
    #[wasm_bindgen]
    pub fn square_color(&self, x: i32, y: i32) -> String {
        self.theme.tone(square_color(x, y)).to_string()
    }

    /// 현재 프레임을 JSON으로 반환
    #[wasm_bindgen]
    pub fn frame(&self) -> Result<JsValue, JsValue> {
        let frame = self.build_frame();
        Ok(serde_wasm_bindgen::to_value(&frame)?)
    }

    /// 렌더러가 스프라이트 로드에 실패했을 때 호출
    #[wasm_bindgen]
    pub fn sprite_failed(&mut self, key: &str) {
        self.sprites.mark_missing(key);
    }

    #[wasm_bindgen]
    pub fn fen(&self) -> String {
        self.controller.fen().to_string()
    }

    #[wasm_bindgen]
    pub fn selected(&self) -> Option<String> {
        self.controller.selected().map(Square::to_notation)
    }

    /// 선택한 기물의 이동 가능 칸 (표기법 사전순: "e3", "e4")
    #[wasm_bindgen]
    pub fn legal_destinations(&self) -> Vec<String> {
        self.sorted_destinations()
    }

    #[wasm_bindgen]
    pub fn set_promotion(&mut self, kind: &str) -> Result<(), JsValue> {
        let kind = parse_piece(kind).map_err(to_js_error)?;
        self.controller.set_promotion(kind).map_err(to_js_error)
    }

    /// 새 게임
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.controller.reset();
    }

    /// 게임 종료 여부
    #[wasm_bindgen]
    pub fn is_game_over(&self) -> bool {
        self.controller
            .rules_engine()
            .map(|engine| engine.outcome().is_some())
            .unwrap_or(false)
    }

    /// 승자 (0=진행중/무승부, 1=백, 2=흑)
    #[wasm_bindgen]
    pub fn winner(&self) -> u8 {
        self.winner_code().unwrap_or(0)
    }

    // === Private helpers ===

    fn build(mut controller: BoardController, options: JsValue) -> Result<Board, JsValue> {
        let options: BoardOptions = if options.is_undefined() || options.is_null() {
            BoardOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        if let Some(kind) = options.promotion().map_err(to_js_error)? {
            controller.set_promotion(kind).map_err(to_js_error)?;
        }
        Ok(Self::with_theme(controller, options.theme()))
    }
}

impl Board {
    pub fn with_theme(controller: BoardController, theme: BoardTheme) -> Self {
        let sprites = SpriteSet::new(&theme);
        Self {
            controller,
            theme,
            sprites,
        }
    }

    pub fn activate(&mut self, square: Square) -> Activation {
        self.controller.on_square_activated(square)
    }

    pub fn sorted_destinations(&self) -> Vec<String> {
        let mut squares: Vec<String> = self
            .controller
            .destinations()
            .iter()
            .map(|square| square.to_notation())
            .collect();
        squares.sort();
        squares
    }

    /// 렌더러에 넘길 프레임 생성. 기물은 국면에서 매번 새로 읽는다.
    pub fn build_frame(&self) -> JsFrame {
        let grid = self.controller.pieces();
        let selected = self.controller.selected();

        let cells = Square::all()
            .map(|square| {
                let highlighted = self.controller.is_highlighted(square);
                let piece = grid[square.y() as usize][square.x() as usize];
                JsCell {
                    x: square.x(),
                    y: square.y(),
                    square: square.to_notation(),
                    fill: self.theme.fill(square, highlighted).to_string(),
                    highlighted,
                    selected: selected == Some(square),
                    center: square.center(),
                    piece: piece.map(|p| self.js_piece(p, square)),
                }
            })
            .collect();

        let engine = self.controller.rules_engine().ok();
        JsFrame {
            cells,
            fen: self.controller.fen().to_string(),
            turn: engine
                .as_ref()
                .map(|e| e.turn().name().to_string())
                .unwrap_or_default(),
            selected: selected.map(Square::to_notation),
            check: engine.as_ref().is_some_and(|e| e.is_check()),
            game_over: engine.as_ref().is_some_and(|e| e.outcome().is_some()),
            winner: self.winner_code(),
        }
    }

    fn js_piece(&self, piece: Piece, square: Square) -> JsPiece {
        let [x, _, z] = square.center();
        let sprite = match self.sprites.visual(piece) {
            PieceVisual::Sprite(path) => Some(path),
            PieceVisual::Glyph(_) => None,
        };
        JsPiece {
            kind: piece.kind.name().to_string(),
            color: piece.color.name().to_string(),
            key: sprite_key(piece),
            sprite,
            glyph: engine::fallback_glyph(piece).to_string(),
            position: [x, PIECE_ELEVATION, z],
        }
    }

    fn winner_code(&self) -> Option<u8> {
        let outcome = self.controller.rules_engine().ok()?.outcome()?;
        Some(match outcome.winner() {
            Some(PieceColor::White) => 1,
            Some(PieceColor::Black) => 2,
            None => 0,
        })
    }
}

fn board_square(x: i32, y: i32) -> Result<Square, JsValue> {
    Square::new(x, y).ok_or_else(|| to_js_error(RulesError::InvalidSquare { x, y }))
}

fn parse_piece(name: &str) -> Result<PieceKind, RulesError> {
    PieceKind::parse(name).ok_or_else(|| RulesError::UnknownPiece(name.to_string()))
}

fn to_js_error(err: RulesError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Debug).is_err() {
        web_sys::console::warn_1(&"logger already initialized".into());
    }
    log::info!("Chessboard WASM initialized!");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_notation(s).unwrap()
    }

    fn board() -> Board {
        Board::with_theme(BoardController::new(), BoardTheme::default())
    }

    #[test]
    fn test_frame_layout() {
        let board = board();
        let frame = board.build_frame();

        assert_eq!(frame.cells.len(), 64);
        assert_eq!(frame.turn, "white");
        assert!(!frame.check);
        assert!(!frame.game_over);
        assert_eq!(frame.winner, None);

        let a8 = &frame.cells[0];
        assert_eq!(a8.square, "a8");
        assert_eq!(a8.fill, "#f3eacb");
        assert_eq!(a8.center, [0.5, 0.0, 0.5]);
        let rook = a8.piece.as_ref().unwrap();
        assert_eq!(rook.key, "br");
        assert_eq!(rook.sprite.as_deref(), Some("/pieces/br.gif"));
        assert_eq!(rook.position, [0.5, PIECE_ELEVATION, 0.5]);

        let e4 = &frame.cells[4 * 8 + 4];
        assert_eq!(e4.square, "e4");
        assert!(e4.piece.is_none());
    }

    #[test]
    fn test_frame_highlights_follow_selection() {
        let mut board = board();
        board.activate(sq("e2"));
        let frame = board.build_frame();

        let highlighted: Vec<&str> = frame
            .cells
            .iter()
            .filter(|c| c.highlighted)
            .map(|c| c.square.as_str())
            .collect();
        assert_eq!(highlighted, vec!["e4", "e3"]);
        assert!(frame
            .cells
            .iter()
            .filter(|c| c.highlighted)
            .all(|c| c.fill == "#ffe499"));
        assert_eq!(frame.selected.as_deref(), Some("e2"));
        assert!(frame.cells[6 * 8 + 4].selected);
        assert_eq!(board.sorted_destinations(), vec!["e3", "e4"]);

        board.activate(sq("b1"));
        assert_eq!(board.sorted_destinations(), vec!["a3", "c3"]);
    }

    #[test]
    fn test_sprite_failure_switches_to_glyph() {
        let mut board = board();
        board.sprite_failed("wk");

        let frame = board.build_frame();
        let king = frame.cells[7 * 8 + 4].piece.as_ref().unwrap();
        assert_eq!(king.key, "wk");
        assert_eq!(king.sprite, None);
        assert_eq!(king.glyph, "♔");

        // 게임 상태는 그대로
        assert_eq!(board.fen(), BoardController::new().fen());
    }

    #[test]
    fn test_options_override_theme() {
        let options = BoardOptions {
            light: Some("#ffffff".to_string()),
            sprite_extension: Some("png".to_string()),
            promotion: Some("knight".to_string()),
            ..BoardOptions::default()
        };
        let theme = options.theme();

        assert_eq!(theme.light, "#ffffff");
        assert_eq!(theme.dark, BoardTheme::default().dark);
        assert_eq!(theme.sprite_extension, "png");
        assert_eq!(options.promotion(), Ok(Some(PieceKind::Knight)));

        let board = Board::with_theme(BoardController::new(), theme);
        assert_eq!(board.square_color(0, 0), "#ffffff");
        assert_eq!(
            board.build_frame().cells[0].piece.as_ref().unwrap().sprite.as_deref(),
            Some("/pieces/br.png")
        );
    }

    #[test]
    fn test_promotion_must_be_promotable_piece() {
        let mut board = board();
        assert!(board.set_promotion("q").is_ok());
        assert_eq!(board.controller.promotion(), PieceKind::Queen);
        assert!(board.set_promotion("n").is_ok());
        assert_eq!(board.controller.promotion(), PieceKind::Knight);

        let king = parse_piece("king").unwrap();
        assert_eq!(
            board.controller.set_promotion(king),
            Err(RulesError::InvalidPromotion("king"))
        );
        assert_eq!(board.controller.promotion(), PieceKind::Knight);

        assert_eq!(
            parse_piece("amazon"),
            Err(RulesError::UnknownPiece("amazon".to_string()))
        );
    }

    #[test]
    fn test_winner_after_checkmate() {
        let controller = BoardController::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        let board = Board::with_theme(controller, BoardTheme::default());

        assert!(board.is_game_over());
        assert_eq!(board.winner(), 2);
        let frame = board.build_frame();
        assert!(frame.check);
        assert!(frame.game_over);
        assert_eq!(frame.winner, Some(2));
    }
}
