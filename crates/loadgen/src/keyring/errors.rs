use flex_error::{define_error, DisplayOnly};

define_error! {
    Error {
        InvalidHexKey
            [ DisplayOnly<hex::FromHexError> ]
            |_| { "private key is not valid hex" },

        InvalidKeyLength
            { length: usize }
            |e| { format!("private key must be 32 bytes, got {}", e.length) },

        InvalidSecretKey
            [ DisplayOnly<secp256k1::Error> ]
            |_| { "invalid secp256k1 secret key" },

        Bech32Encoding
            [ DisplayOnly<bech32::Error> ]
            |_| { "bech32 encoding failed" },

        Bech32Decoding
            [ DisplayOnly<bech32::Error> ]
            |_| { "bech32 decoding failed" },
    }
}
