use super::{Column, LineNumber};

/// ## Compile and run-time errors
///
/// Errors carry a numbered code, an optional source position and a
/// human readable message. Build them with the `error!` macro.

#[derive(Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    line_number: Option<LineNumber>,
    column: Option<Column>,
    message: String,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, $line:expr, $col:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_position($line, $col)
    };
    ($err:ident, $line:expr, $col:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_position($line, $col)
            .message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            line_number: None,
            column: None,
            message: String::new(),
        }
    }

    pub fn in_position(mut self, line: LineNumber, column: Column) -> Error {
        debug_assert!(self.line_number.is_none());
        self.line_number = Some(line);
        self.column = Some(column);
        self
    }

    pub fn message<S: Into<String>>(mut self, message: S) -> Error {
        debug_assert!(self.message.is_empty());
        self.message = message.into();
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn line_number(&self) -> Option<LineNumber> {
        self.line_number
    }

    pub fn column(&self) -> Option<Column> {
        self.column
    }

    pub fn has_position(&self) -> bool {
        self.line_number.is_some()
    }

    pub fn text(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NextWithoutFor = 1,
    SyntaxError = 2,
    ReturnWithoutGosub = 3,
    OutOfData = 4,
    IllegalFunctionCall = 5,
    OutOfMemory = 7,
    UndefinedLabel = 8,
    SubscriptOutOfRange = 9,
    RedimensionedArray = 10,
    DivisionByZero = 11,
    TypeMismatch = 13,
    ForWithoutNext = 26,
    StackOverflow = 28,
    WhileWithoutWend = 29,
    WendWithoutWhile = 30,
    IfWithoutEndif = 31,
    EndifWithoutIf = 32,
    ElseWithoutIf = 33,
    DoWithoutLoop = 34,
    LoopWithoutDo = 35,
    DuplicateLabel = 36,
    UndimmedVariable = 37,
    UnsetPointer = 38,
    ArraySizeMismatch = 39,
    StreamError = 40,
    InternalError = 51,
    FileNotFound = 53,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorCode::*;
        let code_str = match self {
            NextWithoutFor => "NEXT WITHOUT FOR",
            SyntaxError => "SYNTAX ERROR",
            ReturnWithoutGosub => "RETURN WITHOUT GOSUB",
            OutOfData => "OUT OF DATA",
            IllegalFunctionCall => "ILLEGAL FUNCTION CALL",
            OutOfMemory => "OUT OF MEMORY",
            UndefinedLabel => "UNDEFINED LABEL",
            SubscriptOutOfRange => "SUBSCRIPT OUT OF RANGE",
            RedimensionedArray => "REDIMENSIONED ARRAY",
            DivisionByZero => "DIVISION BY ZERO",
            TypeMismatch => "TYPE MISMATCH",
            ForWithoutNext => "FOR WITHOUT NEXT",
            StackOverflow => "STACK OVERFLOW",
            WhileWithoutWend => "WHILE WITHOUT WEND",
            WendWithoutWhile => "WEND WITHOUT WHILE",
            IfWithoutEndif => "IF WITHOUT ENDIF",
            EndifWithoutIf => "ENDIF WITHOUT IF",
            ElseWithoutIf => "ELSE WITHOUT IF",
            DoWithoutLoop => "DO WITHOUT LOOP",
            LoopWithoutDo => "LOOP WITHOUT DO",
            DuplicateLabel => "DUPLICATE LABEL",
            UndimmedVariable => "UNDIMMED VARIABLE",
            UnsetPointer => "UNSET POINTER",
            ArraySizeMismatch => "ARRAY SIZE MISMATCH",
            StreamError => "STREAM ERROR",
            InternalError => "INTERNAL ERROR",
            FileNotFound => "FILE NOT FOUND",
        };
        write!(f, "{}", code_str)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut suffix = String::new();
        if let Some(line_number) = self.line_number {
            suffix.push_str(&format!(" {}", line_number));
            if let Some(column) = self.column {
                suffix.push_str(&format!(":{}", column));
            }
        }
        if !self.message.is_empty() {
            suffix.push_str(&format!("; {}", self.message));
        }
        if suffix.is_empty() {
            write!(f, "{}", self.code)
        } else if self.line_number.is_some() {
            write!(f, "{} IN{}", self.code, suffix)
        } else {
            write!(f, "{}{}", self.code, suffix)
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let e = error!(SyntaxError, 3, 7; "Expected ':'");
        assert_eq!(e.to_string(), "SYNTAX ERROR IN 3:7; Expected ':'");
    }

    #[test]
    fn test_display_without_position() {
        assert_eq!(error!(OutOfData).to_string(), "OUT OF DATA");
        let e = error!(UnsetPointer; "Unset pointer");
        assert_eq!(e.to_string(), "UNSET POINTER; Unset pointer");
        assert_eq!(e.code(), ErrorCode::UnsetPointer);
        assert!(!e.has_position());
    }
}
