use std::collections::HashSet;
use std::fmt;

// 규칙 계산은 전부 rules 크레이트(shakmaty)에 위임
use rules::{File, Rank, RulesEngine};

pub use rules::{
    BoardGrid, MoveDescriptor, Outcome, Piece, PieceColor, PieceKind, PositionSnapshot, RulesError,
};

/// 보드 좌표 (0-indexed: x=0~7, y=0~7)
///
/// 렌더링 기준 좌표라서 y=0이 8랭크(화면 맨 위)다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    x: i32, // 0=a, 7=h
    y: i32, // 0=8, 7=1
}

impl Square {
    /// 보드 밖이면 None
    pub fn new(x: i32, y: i32) -> Option<Self> {
        if (0..8).contains(&x) && (0..8).contains(&y) {
            Some(Self { x, y })
        } else {
            None
        }
    }

    pub fn x(self) -> i32 {
        self.x
    }

    pub fn y(self) -> i32 {
        self.y
    }

    /// "e4" 같은 문자열에서 파싱
    pub fn from_notation(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
            return None;
        }
        Self::new(file as i32 - 'a' as i32, '8' as i32 - rank as i32)
    }

    /// 체스 표기법으로 변환
    pub fn to_notation(self) -> String {
        let file = (b'a' + self.x as u8) as char;
        let rank = (b'8' - self.y as u8) as char;
        format!("{}{}", file, rank)
    }

    /// 규칙 엔진 쪽 칸으로 변환
    pub fn to_rules(self) -> rules::Square {
        rules::Square::from_coords(File::new(self.x as u32), Rank::new((7 - self.y) as u32))
    }

    pub fn from_rules(square: rules::Square) -> Self {
        Self {
            x: u32::from(square.file()) as i32,
            y: 7 - u32::from(square.rank()) as i32,
        }
    }

    /// 3D 씬에서 칸 중심 좌표 [x, 높이, z]
    pub fn center(self) -> [f32; 3] {
        [self.x as f32 + 0.5, 0.0, self.y as f32 + 0.5]
    }

    /// 64칸 전체 (행 우선, 8랭크부터)
    pub fn all() -> impl Iterator<Item = Square> {
        (0..8).flat_map(|y| (0..8).map(move |x| Square { x, y }))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_notation())
    }
}

/// 칸 색조
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareTone {
    Light,
    Dark,
}

/// 체크무늬 색조. 게임 상태와 무관한 순수 함수
pub fn square_color(x: i32, y: i32) -> SquareTone {
    if (x + y).rem_euclid(2) == 0 {
        SquareTone::Light
    } else {
        SquareTone::Dark
    }
}

/// 보드 색상과 스프라이트 경로 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardTheme {
    pub light: String,
    pub dark: String,
    pub highlight: String,
    pub sprite_base: String,
    pub sprite_extension: String,
}

impl Default for BoardTheme {
    fn default() -> Self {
        Self {
            light: "#f3eacb".to_string(),
            dark: "#8a613e".to_string(),
            highlight: "#ffe499".to_string(),
            sprite_base: "/pieces/".to_string(),
            sprite_extension: "gif".to_string(),
        }
    }
}

impl BoardTheme {
    pub fn tone(&self, tone: SquareTone) -> &str {
        match tone {
            SquareTone::Light => &self.light,
            SquareTone::Dark => &self.dark,
        }
    }

    /// 칸 채우기 색. 하이라이트가 체크무늬보다 우선
    pub fn fill(&self, square: Square, highlighted: bool) -> &str {
        if highlighted {
            &self.highlight
        } else {
            self.tone(square_color(square.x, square.y))
        }
    }
}

/// 스프라이트 키: 색 접두어('w'|'b') + 기물 글자
pub fn sprite_key(piece: Piece) -> String {
    format!("{}{}", piece.color.prefix(), piece.kind.char())
}

/// 스프라이트가 없을 때 쓰는 유니코드 기물
pub fn fallback_glyph(piece: Piece) -> &'static str {
    match (piece.color, piece.kind) {
        (PieceColor::White, PieceKind::Pawn) => "♙",
        (PieceColor::White, PieceKind::Rook) => "♖",
        (PieceColor::White, PieceKind::Knight) => "♘",
        (PieceColor::White, PieceKind::Bishop) => "♗",
        (PieceColor::White, PieceKind::Queen) => "♕",
        (PieceColor::White, PieceKind::King) => "♔",
        // 이모지로 그려지지 않도록 텍스트 표현 선택자(U+FE0E)를 붙임
        (PieceColor::Black, PieceKind::Pawn) => "♟\u{FE0E}",
        (PieceColor::Black, PieceKind::Rook) => "♜",
        (PieceColor::Black, PieceKind::Knight) => "♞",
        (PieceColor::Black, PieceKind::Bishop) => "♝",
        (PieceColor::Black, PieceKind::Queen) => "♛",
        (PieceColor::Black, PieceKind::King) => "♚",
    }
}

/// 기물을 그리는 방법
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PieceVisual {
    Sprite(String),
    Glyph(&'static str),
}

/// 스프라이트 경로 계산과 로드 실패 기록
#[derive(Debug, Clone, Default)]
pub struct SpriteSet {
    base: String,
    extension: String,
    missing: HashSet<String>,
}

impl SpriteSet {
    pub fn new(theme: &BoardTheme) -> Self {
        Self {
            base: theme.sprite_base.clone(),
            extension: theme.sprite_extension.clone(),
            missing: HashSet::new(),
        }
    }

    pub fn path(&self, piece: Piece) -> String {
        format!("{}{}.{}", self.base, sprite_key(piece), self.extension)
    }

    /// 로드 실패한 키를 기록한다. 새로 기록했으면 true
    pub fn mark_missing(&mut self, key: &str) -> bool {
        let inserted = self.missing.insert(key.to_string());
        if inserted {
            log::warn!("스프라이트 로드 실패: {}, 글리프로 대체합니다", key);
        }
        inserted
    }

    pub fn is_missing(&self, piece: Piece) -> bool {
        self.missing.contains(&sprite_key(piece))
    }

    pub fn visual(&self, piece: Piece) -> PieceVisual {
        if self.is_missing(piece) {
            PieceVisual::Glyph(fallback_glyph(piece))
        } else {
            PieceVisual::Sprite(self.path(piece))
        }
    }
}

/// 칸 클릭 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// 수가 적용되어 국면이 바뀜
    Moved { from: Square, to: Square },
    /// 엔진이 수를 거부함. 국면은 그대로
    Rejected { from: Square, to: Square },
    /// 기물 선택 (이동 가능 칸이 0개일 수도 있음)
    Selected { square: Square, destinations: usize },
    /// 선택 해제
    Cleared,
}

impl Activation {
    pub fn kind(&self) -> &'static str {
        match self {
            Activation::Moved { .. } => "moved",
            Activation::Rejected { .. } => "rejected",
            Activation::Selected { .. } => "selected",
            Activation::Cleared => "cleared",
        }
    }
}

/// 보드 상호작용 컨트롤러
///
/// 선택 칸 하나와 그 칸에서 갈 수 있는 칸 집합만 들고 있다.
/// 국면은 스냅샷으로만 보관하고, 질의와 수 적용마다 새 엔진을 만든다.
#[derive(Debug, Clone)]
pub struct BoardController {
    position: PositionSnapshot,
    selected: Option<Square>,
    destinations: HashSet<Square>,
    promotion: PieceKind,
}

impl Default for BoardController {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardController {
    /// 초기 배치로 시작
    pub fn new() -> Self {
        Self::with_snapshot(PositionSnapshot::initial())
    }

    pub fn with_snapshot(position: PositionSnapshot) -> Self {
        Self {
            position,
            selected: None,
            destinations: HashSet::new(),
            promotion: PieceKind::Queen,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        Ok(Self::with_snapshot(PositionSnapshot::from_fen(fen)?))
    }

    /// 칸(또는 그 위의 기물) 클릭 처리
    ///
    /// 1. 선택이 있고 클릭한 칸이 이동 가능 칸이면 수를 둔다.
    /// 2. 기물이 있는 칸이면 (색 무관) 그 칸을 선택한다.
    /// 3. 나머지는 선택 해제.
    pub fn on_square_activated(&mut self, square: Square) -> Activation {
        if let Some(from) = self.selected {
            if self.destinations.contains(&square) {
                return self.try_move(from, square);
            }
        }

        if self.piece_at(square).is_some() {
            let destinations = self.legal_destinations_from(square);
            log::debug!("{} 선택, 이동 가능 칸 {}개", square, destinations.len());
            let count = destinations.len();
            self.selected = Some(square);
            self.destinations = destinations;
            Activation::Selected {
                square,
                destinations: count,
            }
        } else {
            self.clear_selection();
            Activation::Cleared
        }
    }

    /// 하이라이트(이동 가능 칸) 여부
    pub fn is_highlighted(&self, square: Square) -> bool {
        self.destinations.contains(&square)
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    pub fn destinations(&self) -> &HashSet<Square> {
        &self.destinations
    }

    pub fn snapshot(&self) -> &PositionSnapshot {
        &self.position
    }

    pub fn fen(&self) -> &str {
        self.position.as_str()
    }

    pub fn promotion(&self) -> PieceKind {
        self.promotion
    }

    /// 프로모션 시 고를 기물 (기본 퀸). 퀸/룩/비숍/나이트만 허용
    pub fn set_promotion(&mut self, kind: PieceKind) -> Result<(), RulesError> {
        match kind {
            PieceKind::Queen | PieceKind::Rook | PieceKind::Bishop | PieceKind::Knight => {
                self.promotion = kind;
                Ok(())
            }
            PieceKind::Pawn | PieceKind::King => Err(RulesError::InvalidPromotion(kind.name())),
        }
    }

    /// 현재 스냅샷으로 만든 새 규칙 엔진
    pub fn rules_engine(&self) -> Result<RulesEngine, RulesError> {
        RulesEngine::from_snapshot(&self.position)
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.rules_engine()
            .ok()
            .and_then(|engine| engine.piece_at(square.to_rules()))
    }

    /// 렌더링용 기물 격자 (국면에서 매번 새로 계산)
    pub fn pieces(&self) -> BoardGrid {
        match self.rules_engine() {
            Ok(engine) => engine.board(),
            Err(err) => {
                log::error!("국면 복원 실패: {}", err);
                [[None; 8]; 8]
            }
        }
    }

    /// 초기 배치로 되돌림
    pub fn reset(&mut self) {
        self.position = PositionSnapshot::initial();
        self.clear_selection();
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.destinations.clear();
    }

    fn legal_destinations_from(&self, square: Square) -> HashSet<Square> {
        match self.rules_engine() {
            Ok(engine) => engine
                .moves(square.to_rules())
                .iter()
                .map(|m| Square::from_rules(m.to))
                .collect(),
            Err(err) => {
                log::error!("국면 복원 실패: {}", err);
                HashSet::new()
            }
        }
    }

    fn try_move(&mut self, from: Square, to: Square) -> Activation {
        let result = self.rules_engine().and_then(|mut engine| {
            engine.apply(from.to_rules(), to.to_rules(), self.promotion)
        });

        // 성공이든 실패든 선택은 해제
        self.clear_selection();

        match result {
            Ok(next) => {
                log::info!("{} -> {}", from, to);
                self.position = next;
                Activation::Moved { from, to }
            }
            Err(err) => {
                log::error!("{}", err);
                Activation::Rejected { from, to }
            }
        }
    }
}
